use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use calchat::calendar::auth::{ServiceAccountKey, TokenProvider};
use calchat::calendar::{CalendarSink, GoogleCalendarSink};
use calchat::config::AppConfig;
use calchat::log::QueryLog;
use calchat::server::Server;
use calchat::session::Assistant;
use calchat::store::ScheduleStore;
use calchat_llm::HttpCompletionClient;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env();

    let store = ScheduleStore::new(&config.database_path);
    if let Err(error) = store.bootstrap() {
        error!(%error, "schedule database could not be initialized");
        std::process::exit(1);
    }

    // A configuration fault here disables the remote-calendar surface
    // only; the local-store surface stays up.
    let sink: Option<Arc<dyn CalendarSink>> = match config.check_calendar_prerequisites() {
        Ok((calendar_id, credentials_path)) => match ServiceAccountKey::from_file(credentials_path)
        {
            Ok(key) => {
                info!(email = %key.client_email, "google calendar surface enabled");
                Some(Arc::new(GoogleCalendarSink::new(
                    calendar_id,
                    config.time_zone.clone(),
                    TokenProvider::new(key),
                )))
            }
            Err(error) => {
                warn!(%error, "google calendar surface disabled");
                None
            }
        },
        Err(error) => {
            warn!(%error, "google calendar surface disabled");
            None
        }
    };

    let client = match HttpCompletionClient::new(config.llm.clone()) {
        Ok(client) => Arc::new(client),
        Err(error) => {
            error!(%error, "completion client could not be built");
            std::process::exit(1);
        }
    };

    let assistant = Assistant::new(
        client,
        store,
        sink,
        QueryLog::new(&config.query_log_path),
    );

    let mut server = match Server::start(assistant).await {
        Ok(server) => server,
        Err(error) => {
            error!(%error, "server failed to start");
            std::process::exit(1);
        }
    };
    info!(addr = %server.addr(), "calchat listening");

    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "signal handling failed");
    }
    let _ = server.shutdown();
}
