use serde::Serialize;

use crate::GuardConfig;

pub const ALL_DISTROS: &str = "all";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleFrequency {
    /// Runs on every boot.
    Always,
    /// Runs once per instance id.
    PerInstance,
    /// Runs once for the lifetime of the host.
    Once,
}

impl ModuleFrequency {
    pub fn as_label(self) -> &'static str {
        match self {
            Self::Always => "always",
            Self::PerInstance => "per_instance",
            Self::Once => "once",
        }
    }
}

impl std::fmt::Display for ModuleFrequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Static description of a boot-time configuration module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleMeta {
    pub id: &'static str,
    pub name: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub distros: &'static [&'static str],
    pub frequency: ModuleFrequency,
    pub activate_by_keys: &'static [&'static str],
    pub examples: &'static [&'static str],
}

impl ModuleMeta {
    /// A module is activated when any of its activation keys is present in
    /// the config, even if the value turns the feature off.
    pub fn activates(&self, config: &GuardConfig) -> bool {
        self.activate_by_keys.iter().any(|key| config.has_key(key))
    }
}
