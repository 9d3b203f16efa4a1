//! Event extraction from natural language.
//!
//! One best-effort completion call with an extraction-only instruction;
//! no SQL awareness, no retry. Absence signals extraction failure, which
//! the orchestrator distinguishes from a user declining to confirm.

use std::sync::Arc;

use calchat_llm::CompletionClient;
use tracing::{debug, warn};

use super::event::ExtractedEvent;

/// Extraction-only instruction for the completion call.
pub const EXTRACTION_INSTRUCTION: &str = r#"Extract event details from the user's request and return as JSON.
Required fields: title, date (YYYYMMDD), time (HHMM in 24h format), location (optional), description (optional)

Example:
User: "2월 17일 오후 3시에 카페에서 친구 만나기"
Output: {"title": "친구 만나기", "date": "250217", "time": "1500", "location": "카페", "description": "친구 만나기"}

Return ONLY valid JSON, no other text."#;

/// Turns one utterance into a structured event record, or nothing.
pub struct EventExtractor {
    client: Arc<dyn CompletionClient>,
}

impl EventExtractor {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }

    /// `None` covers both a failed remote call and a response that does
    /// not validate structurally; the caller cannot tell them apart and
    /// does not need to.
    pub async fn extract(&self, utterance: &str) -> Option<ExtractedEvent> {
        let user = format!("User request: {utterance}");
        let raw = match self.client.complete(EXTRACTION_INSTRUCTION, &user).await {
            Ok(text) => text,
            Err(error) => {
                warn!(%error, "extraction completion failed");
                return None;
            }
        };

        let json = extract_json(&raw)?;
        match serde_json::from_str::<ExtractedEvent>(json) {
            Ok(event) if !event.title.trim().is_empty() && !event.date.trim().is_empty() => {
                debug!(title = %event.title, date = %event.date, "extracted event");
                Some(event)
            }
            Ok(_) => {
                warn!("extracted event missing title or date");
                None
            }
            Err(error) => {
                warn!(%error, "extraction response did not parse");
                None
            }
        }
    }
}

/// Salvage the outermost JSON object from a possibly fenced or prefixed
/// response.
fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}
