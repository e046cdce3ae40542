//! Analysis-to-earnings pipeline.
//!
//! The [`orchestrator::Orchestrator`] sequences video analysis, scenario
//! extraction, value scoring, pricing and persistence for one submission
//! at a time. Every external dependency is reached through the capability
//! traits in [`capabilities`], with PostgreSQL implementations in
//! [`postgres`] and in-memory ones in [`memory`].

pub mod analysis;
pub mod capabilities;
pub mod config;
pub mod error;
pub mod lease;
pub mod memory;
pub mod orchestrator;
pub mod postgres;
pub mod retry;
