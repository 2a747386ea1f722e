//! Worker pool: leases work units, opens target sessions, runs action
//! windows, and records results.

pub mod artifact;
pub mod connection;
pub mod pool;
pub mod runner;

pub use artifact::{ArtifactStore, FsArtifactStore};
pub use connection::{ConnectionManager, Connector, LocalConnector, Session};
pub use pool::Worker;
