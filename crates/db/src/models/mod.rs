//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - A create DTO for inserts where the pipeline writes the table

pub mod earnings;
pub mod lease;
pub mod scenario;
pub mod submission;
