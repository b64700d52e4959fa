use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{found} is not of type 'boolean'")]
    NotBoolean { found: String },
    #[error("`{value}` is not a recognised boolean value")]
    InvalidBoolean { value: String },
}
