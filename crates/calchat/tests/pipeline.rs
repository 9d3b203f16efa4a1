//! End-to-end pipeline scenarios with a canned completion endpoint and
//! a recording sink; no network, no live model.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use calchat::calendar::sink::build_payload;
use calchat::calendar::{CalendarSink, ExtractedEvent, SinkConfirmation, SinkError};
use calchat::log::QueryLog;
use calchat::session::{Assistant, CalendarTurnReply, ConfirmationDecision};
use calchat::store::{ExecuteOutcome, ScheduleStore};
use calchat_llm::CannedCompletionClient;

struct RecordingSink {
    submissions: AtomicUsize,
}

impl RecordingSink {
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
impl CalendarSink for RecordingSink {
    async fn submit(&self, event: &ExtractedEvent) -> Result<SinkConfirmation, SinkError> {
        // Run the real payload normalization so a malformed extraction
        // would fail here exactly as it would against the live service.
        build_payload(event, "Asia/Seoul")?;
        self.submissions.fetch_add(1, Ordering::SeqCst);
        Ok(SinkConfirmation {
            event_id: format!("evt-{}", self.count()),
            html_link: Some("https://calendar.example/evt".to_string()),
        })
    }
}

struct Harness {
    _dir: tempfile::TempDir,
    store: ScheduleStore,
    assistant: Assistant,
}

fn harness(responses: Vec<&str>, sink: Option<Arc<RecordingSink>>) -> Harness {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = ScheduleStore::new(dir.path().join("calendar.db"));
    store.bootstrap().expect("bootstrap");
    let assistant = Assistant::new(
        Arc::new(CannedCompletionClient::new(responses)),
        store.clone(),
        sink.map(|s| s as Arc<dyn CalendarSink>),
        QueryLog::new(dir.path().join("queries.log")),
    );
    Harness {
        _dir: dir,
        store,
        assistant,
    }
}

#[tokio::test]
async fn insert_utterance_stores_exactly_one_matching_row() {
    let mut h = harness(
        vec![
            "INSERT INTO calendar (day, clock, location, passage) VALUES (250217, 1500, 'cafe', 'meet friend');",
        ],
        None,
    );

    let reply = h
        .assistant
        .handle_store_turn("2월 17일 오후 3시에 카페에서 친구 만나기 일정 추가해줘")
        .await
        .expect("reply");
    assert_eq!(reply, "Your request has been processed successfully.");

    let outcome = h.store.execute("SELECT * FROM calendar");
    let ExecuteOutcome::Table(table) = outcome else {
        panic!("expected one stored row, got {outcome:?}");
    };
    assert_eq!(table.rows.len(), 1);
    assert_eq!(
        table.rows[0],
        vec!["250217", "1500", "cafe", "meet friend"]
    );
}

#[tokio::test]
async fn select_after_insert_returns_the_row_as_a_table() {
    let mut h = harness(
        vec![
            "INSERT INTO calendar (day, clock, location, passage) VALUES (250217, 1500, 'cafe', 'meet friend');",
            "SELECT * FROM calendar WHERE day = 250217;",
        ],
        None,
    );

    h.assistant
        .handle_store_turn("2월 17일 오후 3시에 카페에서 친구 만나기 일정 추가해줘")
        .await
        .expect("insert turn");
    let reply = h
        .assistant
        .handle_store_turn("2월 17일의 모든 일정을 보여줘")
        .await
        .expect("select turn");

    assert!(reply.contains("250217"));
    assert!(reply.contains("1500"));
    assert!(reply.contains("cafe"));
    assert!(reply.contains("meet friend"));
    // One data row between the header rule and the closing rule.
    assert_eq!(reply.lines().count(), 5);
}

#[tokio::test]
async fn extraction_holds_for_confirmation_before_any_remote_call() {
    let sink = RecordingSink::new();
    let mut h = harness(
        vec![r#"{"title": "지우 만나기", "date": "250219", "time": "1400", "location": "카페"}"#],
        Some(sink.clone()),
    );

    let reply = h
        .assistant
        .handle_calendar_turn("2월 19일 오후 2시에 카페에서 지우 만나기")
        .await;
    let CalendarTurnReply::PendingConfirmation(event) = reply else {
        panic!("expected a pending extraction, got {reply:?}");
    };

    assert_eq!(event.time, "1400");
    assert!(event.location.as_deref().unwrap_or_default().contains("카페"));
    let payload = build_payload(&event, "Asia/Seoul").expect("payload");
    assert!(payload.start.date_time.starts_with("2025-02-19"));

    // Nothing submitted until the explicit decision.
    assert_eq!(sink.count(), 0);

    let reply = h
        .assistant
        .confirm_pending(ConfirmationDecision::Approve)
        .await;
    assert!(reply.contains("Added to Google Calendar"));
    assert!(reply.contains("evt-1"));
    assert_eq!(sink.count(), 1);
}

#[tokio::test]
async fn failed_extraction_never_reaches_the_sink() {
    let sink = RecordingSink::new();
    let mut h = harness(
        vec!["Sorry, I cannot help with that."],
        Some(sink.clone()),
    );

    let reply = h.assistant.handle_calendar_turn("gibberish input").await;
    assert_eq!(reply, CalendarTurnReply::ExtractionFailed);

    // Approving with nothing pending must not invoke the sink either.
    let reply = h
        .assistant
        .confirm_pending(ConfirmationDecision::Approve)
        .await;
    assert_eq!(reply, "There is no event awaiting confirmation.");
    assert_eq!(sink.count(), 0);
}

#[tokio::test]
async fn missing_credentials_disable_only_the_calendar_surface() {
    let mut h = harness(vec!["SELECT * FROM calendar;"], None);

    assert!(!h.assistant.calendar_enabled());
    let reply = h.assistant.handle_calendar_turn("add my dentist visit").await;
    assert_eq!(reply, CalendarTurnReply::Disabled);

    // The local-store surface is untouched by the configuration fault.
    let reply = h
        .assistant
        .handle_store_turn("show my schedule")
        .await
        .expect("store turn");
    assert_eq!(reply, "No results found.");
}

#[tokio::test]
async fn hostile_generated_sql_is_rejected_before_execution() {
    let mut h = harness(
        vec![
            "INSERT INTO calendar (day, clock, location, passage) VALUES (250217, 1500, 'cafe', 'x');",
            "SELECT * FROM calendar; DROP TABLE calendar;",
            "SELECT * FROM calendar;",
        ],
        None,
    );

    h.assistant.handle_store_turn("add my event").await.expect("insert");

    let reply = h.assistant.handle_store_turn("show everything").await.expect("reply");
    assert!(reply.starts_with("Statement rejected:"));

    // The table survived and still holds the row.
    let reply = h.assistant.handle_store_turn("show everything again").await.expect("reply");
    assert!(reply.contains("250217"));
}

#[tokio::test]
async fn query_log_records_each_store_turn() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = ScheduleStore::new(dir.path().join("calendar.db"));
    store.bootstrap().expect("bootstrap");
    let log_path = dir.path().join("queries.log");
    let mut assistant = Assistant::new(
        Arc::new(CannedCompletionClient::new(vec![
            "SELECT * FROM calendar;",
            "DROP TABLE calendar;",
        ])),
        store,
        None,
        QueryLog::new(&log_path),
    );

    assistant.handle_store_turn("show everything").await.expect("turn");
    assistant.handle_store_turn("drop it all").await.expect("turn");

    let contents = std::fs::read_to_string(&log_path).expect("log file");
    assert!(contents.contains("Status: Success"));
    assert!(contents.contains("Status: Rejected"));
    assert!(contents.contains("User Input: show everything"));
    assert!(contents.contains("Generated SQL: DROP TABLE calendar;"));
}
