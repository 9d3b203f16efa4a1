//! Natural-language to SQL translation.
//!
//! Parsing of open-ended date/time/location phrasing is delegated
//! entirely to the completion endpoint; this module only fixes the
//! instruction and tidies the returned text. The output carries no
//! static guarantee, which is why execution sits behind the statement
//! guard.

use std::sync::Arc;

use calchat_llm::{CompletionClient, LlmError};
use tracing::debug;

/// Schema description plus worked examples for the translation call.
pub const SQL_SYSTEM_INSTRUCTION: &str = r#"You are a database manager specializing in calendar scheduling.
Your task is to convert natural language requests into SQL queries.

You have access to a calendar database with the following structure:
CREATE TABLE calendar (
    day INTEGER,
    clock INTEGER,
    location TEXT,
    passage TEXT
);

Important rules:
1. Only output SQL queries - no explanations or additional text
2. For date input, use YYYYMMDD format (e.g., 250217 for February 17, 2025)
3. For time input, use 24-hour format as integer (e.g., 1330 for 1:30 PM)
4. Handle INSERT, SELECT, UPDATE, and DELETE operations
5. Always ensure the SQL query is valid and executable

===== Few-Shot Examples =====

Example 1 (INSERT):
User request: "2월 17일 오후 3시에 카페에서 친구 만나기 일정 추가해줘"
SQL output: INSERT INTO calendar (day, clock, location, passage) VALUES (250217, 1500, 'cafe', 'meet friend');

Example 2 (SELECT):
User request: "2월 17일의 모든 일정을 보여줘"
SQL output: SELECT * FROM calendar WHERE day = 250217;

Example 3 (UPDATE):
User request: "2월 17일 오후 3시 일정을 집으로 옮겨줘"
SQL output: UPDATE calendar SET location = 'home' WHERE day = 250217 AND clock = 1500;

Example 4 (DELETE):
User request: "2월 17일 오후 3시 일정을 삭제해줘"
SQL output: DELETE FROM calendar WHERE day = 250217 AND clock = 1500;

Example 5 (SELECT with condition):
User request: "office에서 있을 모든 일정을 찾아줘"
SQL output: SELECT * FROM calendar WHERE location = 'office';

===== End of Examples ====="#;

/// Translates one utterance into candidate SQL text.
pub struct SqlTranslator {
    client: Arc<dyn CompletionClient>,
}

impl SqlTranslator {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }

    /// One completion call; best-effort output. Remote faults propagate
    /// to the caller untouched, and an empty completion is treated as a
    /// response fault.
    pub async fn translate(&self, utterance: &str) -> Result<String, LlmError> {
        let user = format!("Convert this request to SQL: {utterance}");
        let raw = self.client.complete(SQL_SYSTEM_INSTRUCTION, &user).await?;
        let sql = strip_code_fences(&raw).trim().to_string();
        debug!(%sql, "translated utterance");
        if sql.is_empty() {
            return Err(LlmError::Response("empty completion".to_string()));
        }
        Ok(sql)
    }
}

/// Remove a surrounding markdown fence if the model added one.
fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop an optional language tag on the opening fence.
    match body.split_once('\n') {
        Some((first, tail)) if !first.contains(' ') => tail,
        _ => body,
    }
}
