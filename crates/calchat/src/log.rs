//! Operator-facing query log.
//!
//! Append-only text file recording each translation turn; written, never
//! read back. Logging failures are traced and swallowed so a full disk
//! cannot take the session down.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use chrono::Local;
use tracing::warn;

const SEPARATOR: &str = "--------------------------------------------------";

#[derive(Debug, Clone)]
pub struct QueryLog {
    path: PathBuf,
}

impl QueryLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Append one entry: timestamp, status, the user's input, and the
    /// text the model generated for it.
    pub fn record(&self, status: &str, input: &str, generated: &str) {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let entry = format!(
            "[{timestamp}]\nStatus: {status}\nUser Input: {input}\nGenerated SQL: {generated}\n{SEPARATOR}\n"
        );
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(entry.as_bytes()));
        if let Err(error) = result {
            warn!(path = %self.path.display(), %error, "query log write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_appends_entries() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("queries.log");
        let log = QueryLog::new(&path);

        log.record("Success", "show everything", "SELECT * FROM calendar;");
        log.record("Rejected", "drop it", "DROP TABLE calendar;");

        let contents = std::fs::read_to_string(&path).expect("read log");
        assert_eq!(contents.matches("Status:").count(), 2);
        assert!(contents.contains("User Input: show everything"));
        assert!(contents.contains("Generated SQL: DROP TABLE calendar;"));
        assert!(contents.contains(SEPARATOR));
    }

    #[test]
    fn unwritable_path_does_not_panic() {
        let log = QueryLog::new("/nonexistent-dir/queries.log");
        log.record("Success", "input", "output");
    }
}
