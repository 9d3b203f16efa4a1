use std::fmt;

/// Unified error type for the calchat crate.
#[derive(Debug, Clone)]
pub enum CoreError {
    /// Configuration missing or unusable at startup.
    Configuration(String),
    /// Invalid input provided by the caller.
    InvalidInput(String),
    /// Internal error.
    Internal(String),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::Configuration(msg) => write!(f, "configuration error: {msg}"),
            CoreError::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            CoreError::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for CoreError {}

/// Result type alias using [`CoreError`].
pub type CoreResult<T> = Result<T, CoreError>;
