mod config;
mod error;
mod module;
mod tracing;

pub use config::{DISABLE_EC2_METADATA_KEY, GuardConfig, parse_flag};
pub use error::ConfigError;
pub use module::{ALL_DISTROS, ModuleFrequency, ModuleMeta};
pub use tracing::init_tracing;
