//! Local schedule store and SQL executor.
//!
//! One table, no primary key, no constraints: the store trusts the
//! translation layer (and the statement guard upstream of it) for value
//! shape. Connections are opened and closed within a single operation;
//! nothing is held across turns.

use std::path::PathBuf;

use rusqlite::types::ValueRef;
use rusqlite::Connection;
use tracing::debug;

use crate::error::{CoreError, CoreResult};

const CREATE_TABLE_SQL: &str = "\
CREATE TABLE IF NOT EXISTS calendar (
    day INTEGER,
    clock INTEGER,
    location TEXT,
    passage TEXT
)";

const MUTATION_MESSAGE: &str = "Your request has been processed successfully.";
const EMPTY_MESSAGE: &str = "No results found.";

/// Rows of a read result, keyed by the statement's own column names.
#[derive(Debug, Clone, PartialEq)]
pub struct TableResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TableResult {
    /// Render an aligned text table.
    pub fn render(&self) -> String {
        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.chars().count()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                let len = cell.chars().count();
                if len > widths[i] {
                    widths[i] = len;
                }
            }
        }

        let rule = {
            let mut line = String::from("+");
            for width in &widths {
                line.push_str(&"-".repeat(width + 2));
                line.push('+');
            }
            line
        };

        let format_row = |cells: &[String]| {
            let mut line = String::from("|");
            for (i, cell) in cells.iter().enumerate() {
                let pad = widths[i] - cell.chars().count();
                line.push(' ');
                line.push_str(cell);
                line.push_str(&" ".repeat(pad + 1));
                line.push('|');
            }
            line
        };

        let mut out = String::new();
        out.push_str(&rule);
        out.push('\n');
        out.push_str(&format_row(&self.columns));
        out.push('\n');
        out.push_str(&rule);
        for row in &self.rows {
            out.push('\n');
            out.push_str(&format_row(row));
        }
        out.push('\n');
        out.push_str(&rule);
        out
    }
}

/// What executing one statement produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecuteOutcome {
    /// Mutating statement committed.
    Mutated,
    /// Read statement with rows.
    Table(TableResult),
    /// Read statement with no rows.
    Empty,
    /// Store-level failure, already rendered descriptive.
    Failed(String),
}

impl ExecuteOutcome {
    pub fn render(&self) -> String {
        match self {
            ExecuteOutcome::Mutated => MUTATION_MESSAGE.to_string(),
            ExecuteOutcome::Table(table) => table.render(),
            ExecuteOutcome::Empty => EMPTY_MESSAGE.to_string(),
            ExecuteOutcome::Failed(message) => message.clone(),
        }
    }
}

/// Handle to the single-table schedule database.
#[derive(Debug, Clone)]
pub struct ScheduleStore {
    path: PathBuf,
}

impl ScheduleStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn open(&self) -> Result<Connection, rusqlite::Error> {
        Connection::open(&self.path)
    }

    /// Create the schedule table if it does not exist yet.
    pub fn bootstrap(&self) -> CoreResult<()> {
        let conn = self
            .open()
            .map_err(|error| CoreError::Internal(error.to_string()))?;
        conn.execute(CREATE_TABLE_SQL, [])
            .map_err(|error| CoreError::Internal(error.to_string()))?;
        Ok(())
    }

    /// Execute one statement. Mutations commit immediately; reads come
    /// back as a table or the distinguished empty status. Store-level
    /// errors never escape this boundary; they are folded into
    /// [`ExecuteOutcome::Failed`].
    pub fn execute(&self, sql: &str) -> ExecuteOutcome {
        debug!(%sql, "executing statement");
        match self.try_execute(sql) {
            Ok(outcome) => outcome,
            Err(error) => ExecuteOutcome::Failed(format!("Database error: {error}")),
        }
    }

    fn try_execute(&self, sql: &str) -> Result<ExecuteOutcome, rusqlite::Error> {
        let conn = self.open()?;

        if is_mutating(sql) {
            conn.execute(sql, [])?;
            return Ok(ExecuteOutcome::Mutated);
        }

        let mut stmt = conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let mut rows = stmt.query([])?;
        let mut collected = Vec::new();
        while let Some(row) = rows.next()? {
            let mut cells = Vec::with_capacity(columns.len());
            for index in 0..columns.len() {
                cells.push(render_value(row.get_ref(index)?));
            }
            collected.push(cells);
        }

        if collected.is_empty() {
            Ok(ExecuteOutcome::Empty)
        } else {
            Ok(ExecuteOutcome::Table(TableResult {
                columns,
                rows: collected,
            }))
        }
    }

    /// Delete every row of the schedule table.
    pub fn clear(&self) -> CoreResult<()> {
        let conn = self
            .open()
            .map_err(|error| CoreError::Internal(error.to_string()))?;
        conn.execute("DELETE FROM calendar", [])
            .map_err(|error| CoreError::Internal(error.to_string()))?;
        Ok(())
    }
}

/// Keyword classification, deliberately a substring check rather than a
/// parse: the guard upstream has already constrained the statement shape.
fn is_mutating(sql: &str) -> bool {
    let upper = sql.to_uppercase();
    ["INSERT", "UPDATE", "DELETE"]
        .iter()
        .any(|keyword| upper.contains(keyword))
}

fn render_value(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => String::new(),
        ValueRef::Integer(n) => n.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        ValueRef::Blob(bytes) => format!("<{} bytes>", bytes.len()),
    }
}
