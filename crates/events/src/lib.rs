//! Orchestration event bus infrastructure.
//!
//! - [`EventBus`] — in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`OrchestrationEvent`] — the canonical domain event envelope.
//! - [`EventPersistence`] — background service that durably writes every
//!   event to the `events` table.

pub mod bus;
pub mod persistence;
pub mod types;

pub use bus::{EventBus, OrchestrationEvent};
pub use persistence::EventPersistence;
