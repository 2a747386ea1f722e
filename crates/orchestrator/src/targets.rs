//! Target directory seam.
//!
//! The coordinator resolves a job's target set through this trait, so
//! tests (and alternative inventories) can stand in for the Postgres
//! directory.

use async_trait::async_trait;

use overseer_core::types::DbId;
use overseer_db::repositories::{JobRepo, TargetRepo};
use overseer_db::DbPool;

use crate::error::OrchestratorError;

/// A target as the coordinator needs it: enough to create a branch and
/// later open a connection.
#[derive(Debug, Clone)]
pub struct ResolvedTarget {
    pub id: DbId,
    pub serial: String,
    pub hostname: String,
    pub connection_method: String,
    pub credentials_ref: Option<String>,
}

/// Read-only view of the target inventory.
#[async_trait]
pub trait TargetDirectory: Send + Sync {
    /// Resolve the given target IDs, silently dropping inactive ones.
    async fn resolve(&self, ids: &[DbId]) -> Result<Vec<ResolvedTarget>, OrchestratorError>;

    /// All active targets (the explicit all-targets fallback).
    async fn all_active(&self) -> Result<Vec<ResolvedTarget>, OrchestratorError>;
}

/// Resolve a job's target set through a [`TargetDirectory`].
///
/// Order of precedence: explicit `target_ids` on the trigger, then the
/// job's stored associations, then (only when the job opted in) all
/// active targets. An empty result is an error: executions never start
/// with zero branches.
pub async fn resolve_for_job(
    directory: &dyn TargetDirectory,
    pool: &DbPool,
    job_id: DbId,
    explicit_ids: &[DbId],
    allow_all_targets_fallback: bool,
) -> Result<Vec<ResolvedTarget>, OrchestratorError> {
    if !explicit_ids.is_empty() {
        let resolved = directory.resolve(explicit_ids).await?;
        if resolved.is_empty() {
            return Err(OrchestratorError::TargetResolution(
                "none of the explicitly requested targets are active".into(),
            ));
        }
        return Ok(resolved);
    }

    let associated = JobRepo::list_target_ids(pool, job_id).await?;
    if !associated.is_empty() {
        let resolved = directory.resolve(&associated).await?;
        if resolved.is_empty() {
            return Err(OrchestratorError::TargetResolution(
                "all of the job's associated targets are inactive".into(),
            ));
        }
        return Ok(resolved);
    }

    if allow_all_targets_fallback {
        let resolved = directory.all_active().await?;
        if resolved.is_empty() {
            return Err(OrchestratorError::TargetResolution(
                "all-targets fallback resolved zero active targets".into(),
            ));
        }
        return Ok(resolved);
    }

    Err(OrchestratorError::TargetResolution(
        "job has no targets and did not opt into the all-targets fallback".into(),
    ))
}

/// Default directory backed by the `targets` table.
pub struct PgTargetDirectory {
    pool: DbPool,
}

impl PgTargetDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TargetDirectory for PgTargetDirectory {
    async fn resolve(&self, ids: &[DbId]) -> Result<Vec<ResolvedTarget>, OrchestratorError> {
        let rows = TargetRepo::find_active_by_ids(&self.pool, ids).await?;
        Ok(rows
            .into_iter()
            .map(|t| ResolvedTarget {
                id: t.id,
                serial: t.serial,
                hostname: t.hostname,
                connection_method: t.connection_method,
                credentials_ref: t.credentials_ref,
            })
            .collect())
    }

    async fn all_active(&self) -> Result<Vec<ResolvedTarget>, OrchestratorError> {
        let rows = TargetRepo::list_active(&self.pool).await?;
        Ok(rows
            .into_iter()
            .map(|t| ResolvedTarget {
                id: t.id,
                serial: t.serial,
                hostname: t.hostname,
                connection_method: t.connection_method,
                credentials_ref: t.credentials_ref,
            })
            .collect())
    }
}
