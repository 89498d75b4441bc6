//! Session rows in the logs database served by the Datasette sidecar.
//!
//! One row per attached agent run: opened right after the container starts,
//! closed with an exit reason when the attach ends.

use crate::agents::AgentId;
use crate::error::Result;
use crate::version;
use chrono::{SecondsFormat, Utc};
use rusqlite::{params, Connection};
use std::path::Path;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    id              TEXT PRIMARY KEY,
    agent           TEXT NOT NULL,
    image           TEXT NOT NULL,
    workspace       TEXT NOT NULL,
    container_id    TEXT NOT NULL,
    container_name  TEXT NOT NULL,
    started_at      TEXT NOT NULL,
    ended_at        TEXT,
    exit_reason     TEXT,
    vibepod_version TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sessions_agent ON sessions(agent);
CREATE INDEX IF NOT EXISTS idx_sessions_started_at ON sessions(started_at);
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    Normal,
    /// Detached with the escape sequence; the container keeps running.
    Detached,
    Interrupted,
    Error,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::Normal => "normal",
            ExitReason::Detached => "detached",
            ExitReason::Interrupted => "keyboard_interrupt",
            ExitReason::Error => "error",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub agent: AgentId,
    pub image: String,
    pub workspace: String,
    pub container_id: String,
    pub container_name: String,
}

/// An open session row.
pub struct SessionLog {
    conn: Connection,
    id: String,
}

impl SessionLog {
    /// Create the schema if needed and insert the session row.
    pub fn open(db_path: &Path, record: &SessionRecord) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)?;
        // Datasette reads the same file while agents write to it
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        let id = uuid::Uuid::new_v4().simple().to_string();
        conn.execute(
            "INSERT INTO sessions \
             (id, agent, image, workspace, container_id, container_name, started_at, vibepod_version) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                id,
                record.agent.as_str(),
                record.image,
                record.workspace,
                record.container_id,
                record.container_name,
                timestamp(),
                version::VERSION,
            ],
        )?;

        tracing::debug!(session = %id, db = %db_path.display(), "session opened");
        Ok(Self { conn, id })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Stamp `ended_at` and the exit reason.
    pub fn close(self, reason: ExitReason) -> Result<()> {
        self.conn.execute(
            "UPDATE sessions SET ended_at = ?1, exit_reason = ?2 WHERE id = ?3",
            params![timestamp(), reason.as_str(), self.id],
        )?;
        tracing::debug!(session = %self.id, reason = reason.as_str(), "session closed");
        Ok(())
    }
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}
