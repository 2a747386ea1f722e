//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - A `Deserialize` create DTO for inserts where callers supply input

pub mod action_result;
pub mod branch;
pub mod event;
pub mod execution;
pub mod job;
pub mod log_entry;
pub mod status;
pub mod target;
pub mod work_unit;
pub mod worker;
