//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod earnings_repo;
pub mod pipeline_lease_repo;
pub mod scenario_repo;
pub mod submission_repo;

pub use earnings_repo::EarningsRepo;
pub use pipeline_lease_repo::PipelineLeaseRepo;
pub use scenario_repo::ScenarioRepo;
pub use submission_repo::SubmissionRepo;
