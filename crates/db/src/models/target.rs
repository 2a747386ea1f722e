//! Target directory rows.
//!
//! The orchestration core treats the target directory as an external
//! collaborator; these rows back the default Postgres implementation of
//! that seam. Targets are soft-deleted so branch audit rows keep a valid
//! denormalised `target_serial` forever.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use overseer_core::types::{DbId, Timestamp};

/// A row from the `targets` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Target {
    pub id: DbId,
    pub uuid: Uuid,
    /// Human-facing serial, e.g. `T0042`.
    pub serial: String,
    pub name: String,
    pub hostname: String,
    /// Transport identifier (`ssh`, `winrm`, `local`, ...).
    pub connection_method: String,
    /// Opaque reference into the credential store; never the secret itself.
    pub credentials_ref: Option<String>,
    pub deleted_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Target {
    /// Whether the target may still be resolved for new executions.
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// DTO for registering a target.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTarget {
    pub name: String,
    pub hostname: String,
    pub connection_method: String,
    pub credentials_ref: Option<String>,
}
