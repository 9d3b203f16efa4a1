//! Remote calendar sink.
//!
//! Final side-effecting write of the extraction pipeline: normalize the
//! extracted date/time, build the service's event payload, submit one
//! authenticated insert. Every failure maps to a descriptive
//! [`SinkError`]; nothing propagates past this boundary.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::auth::TokenProvider;
use super::event::{event_window, normalize_date, normalize_time, ExtractedEvent};

const EVENTS_URL_BASE: &str = "https://www.googleapis.com/calendar/v3/calendars";

/// Failure of a calendar submission.
#[derive(Debug, Clone)]
pub enum SinkError {
    /// Extracted date did not normalize to a real calendar day.
    MalformedDate(String),
    /// Credential or token problems.
    Auth(String),
    /// The request never completed.
    Transport(String),
    /// The service answered with a non-success status.
    Rejected { status: u16, detail: String },
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::MalformedDate(raw) => write!(f, "malformed event date: '{raw}'"),
            SinkError::Auth(msg) => write!(f, "calendar auth failed: {msg}"),
            SinkError::Transport(msg) => write!(f, "calendar request failed: {msg}"),
            SinkError::Rejected { status, detail } => {
                write!(f, "calendar service rejected the event ({status}): {detail}")
            }
        }
    }
}

impl std::error::Error for SinkError {}

/// Durable trace of a successful submission; the only thing retained.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkConfirmation {
    pub event_id: String,
    pub html_link: Option<String>,
}

/// The submission seam, injected into the orchestrator so the
/// confirmation gate can be exercised without a live service.
#[async_trait]
pub trait CalendarSink: Send + Sync {
    async fn submit(&self, event: &ExtractedEvent) -> Result<SinkConfirmation, SinkError>;
}

/// Write-only projection of an [`ExtractedEvent`] into the service's
/// payload shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteCalendarEvent {
    pub summary: String,
    pub description: String,
    pub location: String,
    pub start: EventDateTime,
    pub end: EventDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventDateTime {
    #[serde(rename = "dateTime")]
    pub date_time: String,
    #[serde(rename = "timeZone")]
    pub time_zone: String,
}

#[derive(Debug, Deserialize)]
struct InsertResponse {
    id: String,
    #[serde(rename = "htmlLink")]
    html_link: Option<String>,
}

/// Build the remote payload from an extracted event. Pure; exercised
/// directly by tests so the normalization rules stay pinned.
pub fn build_payload(
    event: &ExtractedEvent,
    time_zone: &str,
) -> Result<RemoteCalendarEvent, SinkError> {
    let date8 = normalize_date(&event.date)
        .ok_or_else(|| SinkError::MalformedDate(event.date.clone()))?;
    let clock = normalize_time(&event.time);
    let (start, end) = event_window(&date8, &clock)
        .ok_or_else(|| SinkError::MalformedDate(event.date.clone()))?;

    Ok(RemoteCalendarEvent {
        summary: event.title.clone(),
        description: event.description.clone().unwrap_or_default(),
        location: event.location.clone().unwrap_or_default(),
        start: EventDateTime {
            date_time: start.format("%Y-%m-%dT%H:%M:%S").to_string(),
            time_zone: time_zone.to_string(),
        },
        end: EventDateTime {
            date_time: end.format("%Y-%m-%dT%H:%M:%S").to_string(),
            time_zone: time_zone.to_string(),
        },
    })
}

/// Sink backed by the Google Calendar REST API.
pub struct GoogleCalendarSink {
    calendar_id: String,
    time_zone: String,
    tokens: TokenProvider,
    http: reqwest::Client,
}

impl GoogleCalendarSink {
    pub fn new(calendar_id: impl Into<String>, time_zone: impl Into<String>, tokens: TokenProvider) -> Self {
        Self {
            calendar_id: calendar_id.into(),
            time_zone: time_zone.into(),
            tokens,
            http: reqwest::Client::new(),
        }
    }

    fn events_url(&self) -> String {
        format!("{EVENTS_URL_BASE}/{}/events", self.calendar_id)
    }
}

#[async_trait]
impl CalendarSink for GoogleCalendarSink {
    async fn submit(&self, event: &ExtractedEvent) -> Result<SinkConfirmation, SinkError> {
        let payload = build_payload(event, &self.time_zone)?;
        let token = self.tokens.fetch_token().await?;

        let response = self
            .http
            .post(self.events_url())
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await
            .map_err(|error| SinkError::Transport(error.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let detail = response.text().await.unwrap_or_default();
            return Err(SinkError::Rejected { status, detail });
        }

        let inserted: InsertResponse = response
            .json()
            .await
            .map_err(|error| SinkError::Transport(format!("insert response did not parse: {error}")))?;

        info!(event_id = %inserted.id, summary = %event.title, "calendar event created");

        Ok(SinkConfirmation {
            event_id: inserted.id,
            html_link: inserted.html_link,
        })
    }
}
