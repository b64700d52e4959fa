use std::fmt;

use serde::{
    Deserialize, Deserializer, Serialize,
    de::{self, Visitor},
};

use crate::ConfigError;

pub const DISABLE_EC2_METADATA_KEY: &str = "disable_ec2_metadata";

/// Host configuration consumed by the metadata route guard.
///
/// Only the keys this crate acts on are modelled; unrelated keys in the same
/// file are ignored so the guard can share a config file with other tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GuardConfig {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_flag"
    )]
    pub disable_ec2_metadata: Option<bool>,
}

impl GuardConfig {
    pub fn with_disable_ec2_metadata(enabled: bool) -> Self {
        Self {
            disable_ec2_metadata: Some(enabled),
        }
    }

    /// Whether the metadata endpoint should be blocked. Absent means `false`.
    pub fn disable_ec2_metadata_enabled(&self) -> bool {
        self.disable_ec2_metadata.unwrap_or(false)
    }

    /// Whether `key` was set at all, regardless of its value.
    pub fn has_key(&self, key: &str) -> bool {
        match key {
            DISABLE_EC2_METADATA_KEY => self.disable_ec2_metadata.is_some(),
            _ => false,
        }
    }
}

/// Parses the string spellings of a boolean accepted in config files and
/// environment variables. Strict: unknown words are an error here, while
/// config deserialization reads them as `false`.
pub fn parse_flag(value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(ConfigError::InvalidBoolean {
            value: value.to_owned(),
        }),
    }
}

fn deserialize_optional_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_option(FlagVisitor)
}

struct FlagVisitor;

impl<'de> Visitor<'de> for FlagVisitor {
    type Value = Option<bool>;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a boolean")
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_any(self)
    }

    fn visit_bool<E: de::Error>(self, value: bool) -> Result<Self::Value, E> {
        Ok(Some(value))
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
        Ok(Some(parse_flag(value).unwrap_or(false)))
    }

    // Integers are rejected even though `1`/`0` are accepted as strings.
    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
        Err(E::custom(ConfigError::NotBoolean {
            found: value.to_string(),
        }))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
        Err(E::custom(ConfigError::NotBoolean {
            found: value.to_string(),
        }))
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<Self::Value, E> {
        Err(E::custom(ConfigError::NotBoolean {
            found: value.to_string(),
        }))
    }
}
