//! Taxonomy-tagged log entries attached to executions and branches.
//!
//! Append-only: rows are inserted, queried, and never mutated.

use serde::Serialize;
use sqlx::FromRow;

use overseer_core::types::{DbId, Timestamp};

/// A row from the `log_entries` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LogEntry {
    pub id: DbId,
    pub execution_id: DbId,
    pub branch_id: Option<DbId>,
    /// Lifecycle phase (`overseer_core::log::LogPhase`).
    pub phase: String,
    /// Severity (`overseer_core::log::LogLevel`).
    pub level: String,
    /// Functional category (`overseer_core::log::LogCategory`).
    pub category: String,
    pub message: String,
    /// Structured detail (failure kind, attempt counts, serials).
    pub detail: serde_json::Value,
    pub created_at: Timestamp,
}

/// DTO for appending a log entry.
#[derive(Debug, Clone)]
pub struct CreateLogEntry {
    pub execution_id: DbId,
    pub branch_id: Option<DbId>,
    pub phase: String,
    pub level: String,
    pub category: String,
    pub message: String,
    pub detail: serde_json::Value,
}
