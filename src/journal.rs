// 📒 Action journal - local record of what this operator changed
//
// Every mutation the backend confirmed is appended here: who did it, to what,
// and when. The backend remains the source of truth; the journal answers
// "what did I do this afternoon" without another round trip.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JournalAction {
    ClaimCreated,
    ClaimApproved,
    ClaimRejected,
    BulkApproved,
    ManuallySettled,
    StatementUploaded,
}

impl JournalAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            JournalAction::ClaimCreated => "CLAIM_CREATED",
            JournalAction::ClaimApproved => "CLAIM_APPROVED",
            JournalAction::ClaimRejected => "CLAIM_REJECTED",
            JournalAction::BulkApproved => "BULK_APPROVED",
            JournalAction::ManuallySettled => "MANUALLY_SETTLED",
            JournalAction::StatementUploaded => "STATEMENT_UPLOADED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "CLAIM_CREATED" => JournalAction::ClaimCreated,
            "CLAIM_APPROVED" => JournalAction::ClaimApproved,
            "CLAIM_REJECTED" => JournalAction::ClaimRejected,
            "BULK_APPROVED" => JournalAction::BulkApproved,
            "MANUALLY_SETTLED" => JournalAction::ManuallySettled,
            "STATEMENT_UPLOADED" => JournalAction::StatementUploaded,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    pub id: String,
    pub action: JournalAction,
    /// What was acted on: "claim:17", "reconciliation:4,9", "statement:<sha256>"
    pub subject: String,
    pub actor_staff_id: i64,
    pub detail: serde_json::Value,
    pub recorded_at: DateTime<Utc>,
}

impl ActionRecord {
    pub fn new(
        action: JournalAction,
        subject: impl Into<String>,
        actor_staff_id: i64,
        detail: serde_json::Value,
    ) -> Self {
        ActionRecord {
            id: uuid::Uuid::new_v4().to_string(),
            action,
            subject: subject.into(),
            actor_staff_id,
            detail,
            recorded_at: Utc::now(),
        }
    }
}

pub struct ActionJournal {
    conn: Connection,
}

impl ActionJournal {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open journal at {}", path.display()))?;
        // WAL keeps the journal readable while the console appends
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS actions (
                id TEXT PRIMARY KEY,
                action TEXT NOT NULL,
                subject TEXT NOT NULL,
                actor_staff_id INTEGER NOT NULL,
                detail TEXT NOT NULL,
                recorded_at TEXT NOT NULL
            )",
            [],
        )
        .context("Failed to create actions table")?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_actions_recorded_at ON actions(recorded_at)",
            [],
        )?;

        Ok(ActionJournal { conn })
    }

    pub fn record(&self, record: &ActionRecord) -> Result<()> {
        let detail = serde_json::to_string(&record.detail)?;
        self.conn
            .execute(
                "INSERT INTO actions (id, action, subject, actor_staff_id, detail, recorded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.id,
                    record.action.as_str(),
                    record.subject,
                    record.actor_staff_id,
                    detail,
                    record.recorded_at.to_rfc3339(),
                ],
            )
            .context("Failed to append journal record")?;
        Ok(())
    }

    /// Newest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<ActionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, action, subject, actor_staff_id, detail, recorded_at
             FROM actions
             ORDER BY recorded_at DESC, rowid DESC
             LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, action, subject, actor_staff_id, detail, recorded_at) = row?;
            records.push(ActionRecord {
                id,
                action: JournalAction::parse(&action)
                    .with_context(|| format!("Unknown journal action '{action}'"))?,
                subject,
                actor_staff_id,
                detail: serde_json::from_str(&detail).context("Corrupt journal detail")?,
                recorded_at: DateTime::parse_from_rfc3339(&recorded_at)
                    .context("Corrupt journal timestamp")?
                    .with_timezone(&Utc),
            });
        }

        Ok(records)
    }

    pub fn count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM actions", [], |row| row.get(0))?;
        Ok(count)
    }
}
