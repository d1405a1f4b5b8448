use thiserror::Error;

/// Errors produced by the callwire protocol and server layers.
#[derive(Debug, Error)]
pub enum CallwireError {
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("ice provider error: {0}")]
    IceProvider(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for CallwireError {
    fn from(e: serde_json::Error) -> Self {
        CallwireError::InvalidMessage(e.to_string())
    }
}

pub type CallwireResult<T> = Result<T, CallwireError>;
