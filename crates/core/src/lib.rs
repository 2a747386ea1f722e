//! Pure orchestration domain logic with zero internal dependencies.
//!
//! Everything in this crate is usable from the repository layer, the
//! orchestrator, the worker pool, and any future CLI tooling without
//! pulling in a database or runtime-specific machinery. Subprocess
//! execution (`exec`) is the one exception that requires Tokio.

pub mod action;
pub mod error;
pub mod exec;
pub mod log;
pub mod queue;
pub mod rollup;
pub mod safety;
pub mod serial;
pub mod state_machine;
pub mod types;
