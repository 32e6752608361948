//! # Mission Log
//!
//! Command history: one entry per dispatch cycle, persisted in SQLite.

use super::db::AeroDb;
use crate::dispatch::{CycleOutcome, DispatchReport};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// How a logged cycle ended
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    Deployed,
    Hold,
    Warning,
    Error,
}

impl LogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deployed => "deployed",
            Self::Hold => "hold",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }

    fn from_str(s: &str) -> Self {
        match s {
            "deployed" => Self::Deployed,
            "hold" => Self::Hold,
            "error" => Self::Error,
            _ => Self::Warning,
        }
    }
}

/// One command-log line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub kind: LogKind,
    pub summary: String,
    pub observation: String,
}

impl LogEntry {
    pub fn new(kind: LogKind, summary: impl Into<String>, observation: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            summary: summary.into(),
            observation: observation.into(),
        }
    }

    /// Summarize a finished cycle
    pub fn from_report(report: &DispatchReport) -> Self {
        let (kind, summary) = match &report.outcome {
            CycleOutcome::Deployed { squad, location } => {
                (LogKind::Deployed, format!("Deployed {squad} to {location}"))
            }
            CycleOutcome::Held => (
                LogKind::Hold,
                "HOLD: All squads maintaining position".to_string(),
            ),
            CycleOutcome::Rejected { reason } => (LogKind::Warning, format!("WARNING: {reason}")),
            CycleOutcome::Failed { cause } => (LogKind::Error, format!("ERROR: {cause}")),
        };
        Self::new(kind, summary, report.observation.clone())
    }

    /// `[HH:MM:SS] summary`
    pub fn display_line(&self) -> String {
        format!("[{}] {}", self.timestamp.format("%H:%M:%S"), self.summary)
    }
}

/// SQLite-backed mission log
pub struct MissionLog {
    conn: Arc<Mutex<Connection>>,
}

impl MissionLog {
    /// Create from shared AeroDb connection
    pub fn new(db: &AeroDb) -> Self {
        Self {
            conn: db.connection(),
        }
    }

    /// Append an entry
    pub fn record(&self, entry: &LogEntry) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        conn.execute(
            "INSERT INTO mission_log (timestamp, kind, summary, observation) VALUES (?1, ?2, ?3, ?4)",
            params![
                entry.timestamp.to_rfc3339(),
                entry.kind.as_str(),
                entry.summary,
                entry.observation
            ],
        )
        .context("Failed to record mission log entry")?;

        tracing::debug!(kind = entry.kind.as_str(), "Recorded: {}", entry.summary);
        Ok(())
    }

    /// Up to `limit` entries, newest first
    pub fn recent(&self, limit: usize) -> Result<Vec<LogEntry>> {
        self.query(
            "SELECT timestamp, kind, summary, observation FROM mission_log ORDER BY id DESC LIMIT ?1",
            limit as i64,
        )
    }

    /// Every entry, oldest first
    pub fn history(&self) -> Result<Vec<LogEntry>> {
        self.query(
            "SELECT timestamp, kind, summary, observation FROM mission_log ORDER BY id ASC LIMIT ?1",
            -1,
        )
    }

    /// Drop all entries, returning how many were removed
    pub fn clear(&self) -> Result<usize> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        let removed = conn.execute("DELETE FROM mission_log", [])?;
        tracing::info!("Cleared {} mission log entries", removed);
        Ok(removed)
    }

    fn query(&self, sql: &str, limit: i64) -> Result<Vec<LogEntry>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params![limit], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (timestamp, kind, summary, observation) = row?;
            let timestamp = DateTime::parse_from_rfc3339(&timestamp)
                .map(|t| t.with_timezone(&Utc))
                .with_context(|| format!("Bad timestamp in mission log: {}", timestamp))?;
            entries.push(LogEntry {
                timestamp,
                kind: LogKind::from_str(&kind),
                summary,
                observation,
            });
        }
        Ok(entries)
    }
}
