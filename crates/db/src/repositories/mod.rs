//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument; methods that must join a
//! caller-owned transaction accept `&mut PgConnection` instead.

pub mod action_result_repo;
pub mod branch_repo;
pub mod event_repo;
pub mod execution_repo;
pub mod job_repo;
pub mod log_repo;
pub mod serial_repo;
pub mod target_repo;
pub mod work_unit_repo;
pub mod worker_repo;

pub use action_result_repo::ActionResultRepo;
pub use branch_repo::BranchRepo;
pub use event_repo::EventRepo;
pub use execution_repo::ExecutionRepo;
pub use job_repo::JobRepo;
pub use log_repo::LogRepo;
pub use serial_repo::SerialRepo;
pub use target_repo::TargetRepo;
pub use work_unit_repo::WorkUnitRepo;
pub use worker_repo::WorkerRepo;
