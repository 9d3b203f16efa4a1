use std::fmt;

/// Errors produced by the completion client.
#[derive(Debug, Clone)]
pub enum LlmError {
    MissingApiKey,
    Http(String),
    Response(String),
    Serialization(String),
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmError::MissingApiKey => write!(f, "missing LLM API key"),
            LlmError::Http(msg) => write!(f, "http error: {msg}"),
            LlmError::Response(msg) => write!(f, "response error: {msg}"),
            LlmError::Serialization(msg) => write!(f, "serialization error: {msg}"),
        }
    }
}

impl std::error::Error for LlmError {}
