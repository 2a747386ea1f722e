//! Orchestrator error type.

use overseer_core::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("No valid targets resolved: {0}")]
    TargetResolution(String),

    #[error("Serial allocation failed: {0}")]
    SerialGeneration(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Validation failed: {0}")]
    Validation(String),
}
