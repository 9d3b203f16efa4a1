//! Session orchestration.
//!
//! Owns the conversation history and the single pending-extraction
//! slot, routes each turn to the local-store or remote-calendar
//! pipeline, and renders replies. One `Assistant` value is one logical
//! session; nothing here is shared between sessions.

use std::sync::Arc;

use calchat_llm::{CompletionClient, LlmError};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::calendar::{CalendarSink, EventExtractor, ExtractedEvent};
use crate::log::QueryLog;
use crate::sql::{self, SqlTranslator};
use crate::store::ScheduleStore;

pub const GREETING: &str =
    "I'm your calendar DB manager. You can INSERT, SELECT, UPDATE, or DELETE your schedule by chatting 😃";

const DISABLED_MESSAGE: &str =
    "Google Calendar is not configured. The local schedule database remains fully usable.";
const EXTRACTION_FAILED_MESSAGE: &str =
    "Could not extract event details from that message. Please try again.";
const NOTHING_PENDING_MESSAGE: &str = "There is no event awaiting confirmation.";
const DISCARDED_MESSAGE: &str = "Discarded the extracted event.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One entry of the append-only conversation history.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

/// User's decision on a pending extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationDecision {
    Approve,
    Deny,
}

/// Outcome of one remote-calendar turn.
#[derive(Debug, Clone, PartialEq)]
pub enum CalendarTurnReply {
    /// The surface is disabled by a startup configuration fault.
    Disabled,
    /// Extraction failed; the confirmation gate is not reachable.
    ExtractionFailed,
    /// An event was extracted and now awaits explicit confirmation.
    PendingConfirmation(ExtractedEvent),
}

impl CalendarTurnReply {
    pub fn render(&self) -> String {
        match self {
            CalendarTurnReply::Disabled => DISABLED_MESSAGE.to_string(),
            CalendarTurnReply::ExtractionFailed => EXTRACTION_FAILED_MESSAGE.to_string(),
            CalendarTurnReply::PendingConfirmation(event) => {
                let mut text = format!(
                    "Extracted event: {} on {} at {}",
                    event.title, event.date, event.time
                );
                if let Some(location) = &event.location {
                    text.push_str(&format!(" ({location})"));
                }
                text.push_str(". Confirm to add it to Google Calendar.");
                text
            }
        }
    }
}

#[derive(Debug, Clone)]
struct PendingEvent {
    utterance: String,
    event: ExtractedEvent,
}

/// One interactive session over both pipelines.
pub struct Assistant {
    session_id: String,
    history: Vec<ConversationTurn>,
    pending: Option<PendingEvent>,
    translator: SqlTranslator,
    extractor: EventExtractor,
    store: ScheduleStore,
    sink: Option<Arc<dyn CalendarSink>>,
    query_log: QueryLog,
}

impl Assistant {
    /// `sink: None` means the remote-calendar surface is disabled; the
    /// local-store surface is unaffected.
    pub fn new(
        client: Arc<dyn CompletionClient>,
        store: ScheduleStore,
        sink: Option<Arc<dyn CalendarSink>>,
        query_log: QueryLog,
    ) -> Self {
        let mut history = Vec::new();
        history.push(ConversationTurn {
            role: Role::Assistant,
            content: GREETING.to_string(),
        });
        Self {
            session_id: Uuid::new_v4().to_string(),
            history,
            pending: None,
            translator: SqlTranslator::new(client.clone()),
            extractor: EventExtractor::new(client),
            store,
            sink,
            query_log,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn history(&self) -> &[ConversationTurn] {
        &self.history
    }

    pub fn pending_event(&self) -> Option<&ExtractedEvent> {
        self.pending.as_ref().map(|pending| &pending.event)
    }

    pub fn calendar_enabled(&self) -> bool {
        self.sink.is_some()
    }

    fn push(&mut self, role: Role, content: impl Into<String>) {
        self.history.push(ConversationTurn {
            role,
            content: content.into(),
        });
    }

    /// Local-store surface: translate, guard, execute, render.
    ///
    /// A completion fault on this path propagates to the caller; the
    /// turn surfaces as a generic failure rather than a crafted reply.
    pub async fn handle_store_turn(&mut self, input: &str) -> Result<String, LlmError> {
        self.push(Role::User, input);

        let generated = self.translator.translate(input).await?;

        let reply = match sql::check(&generated) {
            Err(rejection) => {
                self.query_log.record("Rejected", input, &generated);
                info!(%rejection, "generated statement rejected");
                format!("Statement rejected: {rejection}")
            }
            Ok(_) => {
                self.query_log.record("Success", input, &generated);
                self.store.execute(&generated).render()
            }
        };

        self.push(Role::Assistant, &reply);
        Ok(reply)
    }

    /// Remote-calendar surface, first half: extract and hold for
    /// confirmation. Any previously pending event is displaced.
    pub async fn handle_calendar_turn(&mut self, input: &str) -> CalendarTurnReply {
        self.pending = None;

        if self.sink.is_none() {
            return CalendarTurnReply::Disabled;
        }

        self.push(Role::User, input);

        let reply = match self.extractor.extract(input).await {
            Some(event) => {
                self.pending = Some(PendingEvent {
                    utterance: input.to_string(),
                    event: event.clone(),
                });
                CalendarTurnReply::PendingConfirmation(event)
            }
            None => CalendarTurnReply::ExtractionFailed,
        };

        self.push(Role::Assistant, reply.render());
        reply
    }

    /// Remote-calendar surface, second half: act on the user's explicit
    /// decision. The sink is only ever invoked from here.
    pub async fn confirm_pending(&mut self, decision: ConfirmationDecision) -> String {
        let Some(pending) = self.pending.take() else {
            return NOTHING_PENDING_MESSAGE.to_string();
        };

        let reply = match decision {
            ConfirmationDecision::Deny => DISCARDED_MESSAGE.to_string(),
            ConfirmationDecision::Approve => match &self.sink {
                None => DISABLED_MESSAGE.to_string(),
                Some(sink) => {
                    let summary = serde_json::to_string(&pending.event)
                        .unwrap_or_else(|_| pending.event.title.clone());
                    match sink.submit(&pending.event).await {
                        Ok(confirmation) => {
                            self.query_log.record(
                                "Calendar Added",
                                &pending.utterance,
                                &summary,
                            );
                            match &confirmation.html_link {
                                Some(link) => format!(
                                    "Added to Google Calendar. (ID: {}) {link}",
                                    confirmation.event_id
                                ),
                                None => format!(
                                    "Added to Google Calendar. (ID: {})",
                                    confirmation.event_id
                                ),
                            }
                        }
                        Err(error) => {
                            self.query_log.record(
                                &format!("Failed: {error}"),
                                &pending.utterance,
                                &summary,
                            );
                            format!("Google Calendar insert failed: {error}")
                        }
                    }
                }
            },
        };

        self.push(Role::Assistant, &reply);
        reply
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{SinkConfirmation, SinkError};
    use async_trait::async_trait;
    use calchat_llm::CannedCompletionClient;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSink {
        submissions: AtomicUsize,
    }

    impl CountingSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                submissions: AtomicUsize::new(0),
            })
        }

        fn count(&self) -> usize {
            self.submissions.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CalendarSink for CountingSink {
        async fn submit(&self, _event: &ExtractedEvent) -> Result<SinkConfirmation, SinkError> {
            self.submissions.fetch_add(1, Ordering::SeqCst);
            Ok(SinkConfirmation {
                event_id: "evt-1".to_string(),
                html_link: None,
            })
        }
    }

    fn scratch_assistant(
        responses: Vec<&str>,
        sink: Option<Arc<dyn CalendarSink>>,
    ) -> (tempfile::TempDir, Assistant) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ScheduleStore::new(dir.path().join("calendar.db"));
        store.bootstrap().expect("bootstrap");
        let log = QueryLog::new(dir.path().join("queries.log"));
        let client = Arc::new(CannedCompletionClient::new(responses));
        (dir, Assistant::new(client, store, sink, log))
    }

    #[tokio::test]
    async fn store_turn_appends_history_before_and_after() {
        let (_dir, mut assistant) =
            scratch_assistant(vec!["SELECT * FROM calendar;"], None);
        assistant.handle_store_turn("show everything").await.expect("reply");

        let history = assistant.history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].content, GREETING);
        assert_eq!(history[1].role, Role::User);
        assert_eq!(history[1].content, "show everything");
        assert_eq!(history[2].role, Role::Assistant);
    }

    #[tokio::test]
    async fn rejected_statement_renders_status_and_executes_nothing() {
        let (_dir, mut assistant) =
            scratch_assistant(vec!["DROP TABLE calendar;", "SELECT * FROM calendar;"], None);

        let reply = assistant.handle_store_turn("drop everything").await.expect("reply");
        assert!(reply.starts_with("Statement rejected:"));

        // The table is still there for the next, legitimate turn.
        let reply = assistant.handle_store_turn("show everything").await.expect("reply");
        assert_eq!(reply, "No results found.");
    }

    #[tokio::test]
    async fn confirm_without_pending_is_a_noop() {
        let sink = CountingSink::new();
        let (_dir, mut assistant) = scratch_assistant(vec![], Some(sink.clone()));
        let reply = assistant.confirm_pending(ConfirmationDecision::Approve).await;
        assert_eq!(reply, NOTHING_PENDING_MESSAGE);
        assert_eq!(sink.count(), 0);
    }

    #[tokio::test]
    async fn deny_discards_without_submitting() {
        let sink = CountingSink::new();
        let (_dir, mut assistant) = scratch_assistant(
            vec![r#"{"title": "lunch", "date": "250301", "time": "1200"}"#],
            Some(sink.clone()),
        );

        let reply = assistant.handle_calendar_turn("lunch on march 1st").await;
        assert!(matches!(reply, CalendarTurnReply::PendingConfirmation(_)));
        assert!(assistant.pending_event().is_some());

        let reply = assistant.confirm_pending(ConfirmationDecision::Deny).await;
        assert_eq!(reply, DISCARDED_MESSAGE);
        assert!(assistant.pending_event().is_none());
        assert_eq!(sink.count(), 0);
    }

    #[tokio::test]
    async fn new_calendar_turn_displaces_pending_event() {
        let sink = CountingSink::new();
        let (_dir, mut assistant) = scratch_assistant(
            vec![
                r#"{"title": "first", "date": "250301"}"#,
                "not json at all",
            ],
            Some(sink.clone()),
        );

        assistant.handle_calendar_turn("first event").await;
        assert_eq!(assistant.pending_event().expect("pending").title, "first");

        let reply = assistant.handle_calendar_turn("garbled").await;
        assert_eq!(reply, CalendarTurnReply::ExtractionFailed);
        assert!(assistant.pending_event().is_none());
    }

    #[tokio::test]
    async fn disabled_surface_short_circuits() {
        let (_dir, mut assistant) = scratch_assistant(vec![], None);
        assert!(!assistant.calendar_enabled());
        let reply = assistant.handle_calendar_turn("add something").await;
        assert_eq!(reply, CalendarTurnReply::Disabled);
        // No user turn recorded; only the greeting is present.
        assert_eq!(assistant.history().len(), 1);
    }
}
