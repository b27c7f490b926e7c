use thiserror::Error;

#[derive(Debug, Error)]
pub enum CallrecError {
    #[error("io error: {0}")]
    Io(String),
    #[error("config parse error: {0}")]
    ConfigParse(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("cli error: {0}")]
    Cli(String),
    #[error("serialization error: {0}")]
    Serialize(String),
    #[error(transparent)]
    Replay(#[from] ReplayError),
}

/// Raised by `replay` when the target carries no call history.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplayError {
    #[error("invalid replay target: `{name}` has no call history attached")]
    InvalidTarget { name: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("value under `{key}` is not an integer: {value}")]
    Conversion { key: String, value: String },
}
