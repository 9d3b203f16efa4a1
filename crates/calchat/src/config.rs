//! Process configuration, loaded once at startup.

use std::env;
use std::path::{Path, PathBuf};

use calchat_llm::LlmSettings;

use crate::error::{CoreError, CoreResult};

pub const DEFAULT_DATABASE_PATH: &str = "calendar.db";
pub const DEFAULT_QUERY_LOG_PATH: &str = "gpt_queries.log";
pub const DEFAULT_CREDENTIALS_PATH: &str = "service_account.json";
pub const DEFAULT_TIME_ZONE: &str = "Asia/Seoul";

/// Everything the assistant needs from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_path: PathBuf,
    pub query_log_path: PathBuf,
    pub calendar_id: Option<String>,
    pub credentials_path: PathBuf,
    pub time_zone: String,
    pub llm: LlmSettings,
}

impl AppConfig {
    /// Read the configuration from the environment. Every field has a
    /// working default except the calendar id, which stays `None` when
    /// unset and leaves the remote-calendar surface disabled.
    pub fn from_env() -> Self {
        let database_path = env::var("CALCHAT_DB_PATH")
            .ok()
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_DATABASE_PATH.to_string());
        let query_log_path = env::var("CALCHAT_QUERY_LOG")
            .ok()
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_QUERY_LOG_PATH.to_string());
        let calendar_id = env::var("CALCHAT_CALENDAR_ID")
            .ok()
            .filter(|value| !value.is_empty());
        let credentials_path = env::var("CALCHAT_CREDENTIALS_PATH")
            .ok()
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_CREDENTIALS_PATH.to_string());
        let time_zone = env::var("CALCHAT_TIME_ZONE")
            .ok()
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_TIME_ZONE.to_string());

        Self {
            database_path: PathBuf::from(database_path),
            query_log_path: PathBuf::from(query_log_path),
            calendar_id,
            credentials_path: PathBuf::from(credentials_path),
            time_zone,
            llm: LlmSettings::from_env(),
        }
    }

    /// Check the pieces the remote-calendar surface needs. Failure here
    /// is reported, not fatal: the local-store surface keeps working.
    pub fn check_calendar_prerequisites(&self) -> CoreResult<(&str, &Path)> {
        let calendar_id = self.calendar_id.as_deref().ok_or_else(|| {
            CoreError::Configuration("no calendar id configured".to_string())
        })?;
        if !self.credentials_path.exists() {
            return Err(CoreError::Configuration(format!(
                "service account file not found: {}",
                self.credentials_path.display()
            )));
        }
        Ok((calendar_id, self.credentials_path.as_path()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_config() -> AppConfig {
        AppConfig {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            query_log_path: PathBuf::from(DEFAULT_QUERY_LOG_PATH),
            calendar_id: None,
            credentials_path: PathBuf::from("definitely-not-present.json"),
            time_zone: DEFAULT_TIME_ZONE.to_string(),
            llm: LlmSettings::default(),
        }
    }

    #[test]
    fn missing_calendar_id_fails_prerequisites() {
        let config = bare_config();
        let err = config.check_calendar_prerequisites().unwrap_err();
        assert!(matches!(err, CoreError::Configuration(_)));
    }

    #[test]
    fn missing_credential_file_fails_prerequisites() {
        let mut config = bare_config();
        config.calendar_id = Some("someone@example.com".to_string());
        let err = config.check_calendar_prerequisites().unwrap_err();
        assert!(err.to_string().contains("service account file not found"));
    }

    #[test]
    fn present_credential_file_passes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let key_path = dir.path().join("sa.json");
        std::fs::write(&key_path, "{}").expect("write");

        let mut config = bare_config();
        config.calendar_id = Some("someone@example.com".to_string());
        config.credentials_path = key_path.clone();

        let (id, path) = config.check_calendar_prerequisites().expect("ok");
        assert_eq!(id, "someone@example.com");
        assert_eq!(path, key_path.as_path());
    }
}
