pub mod client;
pub mod error;
pub mod settings;

pub use client::{CannedCompletionClient, CompletionClient, HttpCompletionClient};
pub use error::LlmError;
pub use settings::LlmSettings;
