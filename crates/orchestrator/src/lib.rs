//! Orchestration engine: execution coordination, dispatch, and the retry
//! supervisor.
//!
//! The [`coordinator`] turns a job trigger into an execution tree
//! (execution, per-target branches, initial work units) in one
//! transaction. The [`dispatcher`] enqueues follow-up work units as
//! dispatch stages complete. The [`supervisor`] sweeps expired leases
//! back into the queue with backoff and enforces the execution
//! wall-clock ceiling.

pub mod config;
pub mod coordinator;
pub mod dispatcher;
pub mod error;
pub mod supervisor;
pub mod targets;

pub use config::OrchestratorConfig;
pub use coordinator::Coordinator;
pub use error::OrchestratorError;
pub use targets::{PgTargetDirectory, ResolvedTarget, TargetDirectory};
