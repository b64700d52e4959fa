use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use types::{DISABLE_EC2_METADATA_KEY, GuardConfig};

use crate::GuardError;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/imds-guard/guard.toml";
pub const CONFIG_ENV_PREFIX: &str = "IMDS_GUARD__";

/// Where [`load_config`] reads from, lowest precedence first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSources {
    /// Explicit config file; must exist when set.
    pub file: Option<PathBuf>,
    /// Fallback file, merged only when present.
    pub default_file: PathBuf,
    pub env_prefix: String,
    pub overrides: GuardConfig,
}

impl Default for ConfigSources {
    fn default() -> Self {
        Self {
            file: None,
            default_file: PathBuf::from(DEFAULT_CONFIG_PATH),
            env_prefix: CONFIG_ENV_PREFIX.to_owned(),
            overrides: GuardConfig::default(),
        }
    }
}

pub fn load_config(sources: &ConfigSources) -> Result<GuardConfig, GuardError> {
    let mut figment = Figment::from(Serialized::defaults(GuardConfig::default()));
    match &sources.file {
        Some(path) => {
            if !path.is_file() {
                return Err(GuardError::MissingConfig { path: path.clone() });
            }
            figment = figment.merge(Toml::file(path));
        }
        None => {
            figment = merge_if_present(figment, &sources.default_file);
        }
    }
    figment = figment.merge(
        Env::prefixed(&sources.env_prefix)
            .split("__")
            .ignore(&[DISABLE_EC2_METADATA_KEY]),
    );
    if let Some(raw) = env_flag(&sources.env_prefix) {
        figment = figment.merge(Serialized::default(DISABLE_EC2_METADATA_KEY, raw));
    }
    figment = figment.merge(Serialized::defaults(sources.overrides));

    Ok(figment.extract()?)
}

// `Env` would parse `1` as an integer, so the flag is passed on as a string.
fn env_flag(prefix: &str) -> Option<String> {
    Env::prefixed(prefix)
        .split("__")
        .only(&[DISABLE_EC2_METADATA_KEY])
        .iter()
        .map(|(_, value)| value)
        .last()
}

fn merge_if_present(figment: Figment, path: &Path) -> Figment {
    if path.is_file() {
        figment.merge(Toml::file(path))
    } else {
        figment
    }
}
