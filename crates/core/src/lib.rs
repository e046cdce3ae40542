//! Pure domain logic for the dashcam scenario marketplace.
//!
//! Nothing in this crate performs I/O. Detection normalization, scenario
//! extraction, value scoring and earnings pricing are all deterministic
//! functions of their inputs so they can be tested in isolation from the
//! analysis service and the database.

pub mod detection;
pub mod earnings;
pub mod error;
pub mod extraction;
pub mod threshold_validation;
pub mod types;
pub mod value_score;
