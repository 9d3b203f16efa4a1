//! HTTP surface for the assistant.
//!
//! One route per interaction surface, plus history and health; a chat
//! front end drives these. The assistant is a single logical
//! session behind a mutex; each request runs one pipeline to completion
//! before the next is admitted.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tower_http::cors::{Any, CorsLayer};
use tracing::error;

use crate::session::{Assistant, CalendarTurnReply, ConfirmationDecision, ConversationTurn};

pub struct Server {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
}

struct ServerState {
    assistant: Mutex<Assistant>,
}

impl Server {
    /// Bind a local port and start serving the assistant.
    pub async fn start(assistant: Assistant) -> Result<Self, String> {
        let state = Arc::new(ServerState {
            assistant: Mutex::new(assistant),
        });
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        let app = Router::new()
            .route("/health", get(health))
            .route("/store/message", post(store_message))
            .route("/calendar/message", post(calendar_message))
            .route("/calendar/confirm", post(calendar_confirm))
            .route("/history", get(history))
            .with_state(state)
            .layer(cors);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|error| error.to_string())?;
        let addr = listener.local_addr().map_err(|error| error.to_string())?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await;
        });

        Ok(Server {
            addr,
            shutdown: Some(shutdown_tx),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn shutdown(&mut self) -> Result<(), String> {
        if let Some(sender) = self.shutdown.take() {
            sender
                .send(())
                .map_err(|_| "failed to send server shutdown signal".to_string())
        } else {
            Ok(())
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
struct MessageRequest {
    text: String,
}

#[derive(Debug, Serialize)]
struct MessageResponse {
    ok: bool,
    reply: String,
}

impl MessageResponse {
    fn success(reply: impl Into<String>) -> Self {
        Self {
            ok: true,
            reply: reply.into(),
        }
    }

    fn failure(reply: impl Into<String>) -> Self {
        Self {
            ok: false,
            reply: reply.into(),
        }
    }
}

async fn store_message(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<MessageRequest>,
) -> Json<MessageResponse> {
    if request.text.trim().is_empty() {
        return Json(MessageResponse::failure("Type a request to get started."));
    }

    let mut assistant = state.assistant.lock().await;
    match assistant.handle_store_turn(&request.text).await {
        Ok(reply) => Json(MessageResponse::success(reply)),
        Err(fault) => {
            error!(%fault, "store turn failed");
            Json(MessageResponse::failure(
                "The request could not be processed.",
            ))
        }
    }
}

#[derive(Debug, Serialize)]
struct CalendarMessageResponse {
    status: &'static str,
    reply: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    event: Option<crate::calendar::ExtractedEvent>,
}

async fn calendar_message(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<MessageRequest>,
) -> Json<CalendarMessageResponse> {
    if request.text.trim().is_empty() {
        return Json(CalendarMessageResponse {
            status: "failed",
            reply: "Describe the event you want to add.".to_string(),
            event: None,
        });
    }

    let mut assistant = state.assistant.lock().await;
    let reply = assistant.handle_calendar_turn(&request.text).await;
    let rendered = reply.render();
    let (status, event) = match reply {
        CalendarTurnReply::Disabled => ("disabled", None),
        CalendarTurnReply::ExtractionFailed => ("failed", None),
        CalendarTurnReply::PendingConfirmation(event) => ("pending", Some(event)),
    };
    Json(CalendarMessageResponse {
        status,
        reply: rendered,
        event,
    })
}

#[derive(Debug, Deserialize)]
struct ConfirmRequest {
    approve: bool,
}

async fn calendar_confirm(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<ConfirmRequest>,
) -> Json<MessageResponse> {
    let decision = if request.approve {
        ConfirmationDecision::Approve
    } else {
        ConfirmationDecision::Deny
    };
    let mut assistant = state.assistant.lock().await;
    let reply = assistant.confirm_pending(decision).await;
    Json(MessageResponse::success(reply))
}

async fn history(State(state): State<Arc<ServerState>>) -> Json<Vec<ConversationTurn>> {
    let assistant = state.assistant.lock().await;
    Json(assistant.history().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::QueryLog;
    use crate::store::ScheduleStore;
    use calchat_llm::CannedCompletionClient;

    fn scratch_assistant(dir: &tempfile::TempDir) -> Assistant {
        let store = ScheduleStore::new(dir.path().join("calendar.db"));
        store.bootstrap().expect("bootstrap");
        Assistant::new(
            Arc::new(CannedCompletionClient::default()),
            store,
            None,
            QueryLog::new(dir.path().join("queries.log")),
        )
    }

    #[tokio::test]
    async fn start_binds_a_local_port() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut server = Server::start(scratch_assistant(&dir)).await.expect("start");
        assert_ne!(server.addr().port(), 0);
        server.shutdown().expect("shutdown");
    }

    #[tokio::test]
    async fn shutdown_twice_is_harmless() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut server = Server::start(scratch_assistant(&dir)).await.expect("start");
        server.shutdown().expect("first shutdown");
        server.shutdown().expect("second shutdown");
    }
}
