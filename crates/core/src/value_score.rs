//! Marketplace value score for a submission.
//!
//! The score is a content-density measure: weighted scenario and edge-case
//! counts per minute of footage. Short, dense clips outrank long clips with
//! the same handful of events.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::extraction::Scenario;
use crate::threshold_validation::{validate_non_negative, validate_positive};

/// Seconds per minute (60.0).
pub const SECS_PER_MINUTE: f64 = 60.0;

/// Decimal places kept on the published score.
pub const SCORE_PRECISION: i32 = 4;

/// Tunables for [`score`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Points per scenario.
    pub scenario_weight: f64,
    /// Additional points per edge case, on top of its scenario weight.
    pub edge_case_weight: f64,
    /// Lowest score ever reported.
    pub floor: f64,
    /// Footage shorter than this is normalized as if it were this long,
    /// so a two-second clip with one event does not dominate the market.
    pub min_window_secs: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            scenario_weight: 1.0,
            edge_case_weight: 3.0,
            floor: 0.0,
            min_window_secs: 60.0,
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_non_negative(self.scenario_weight, "scenario_weight")?;
        validate_non_negative(self.edge_case_weight, "edge_case_weight")?;
        validate_non_negative(self.floor, "floor")?;
        validate_positive(self.min_window_secs, "min_window_secs")?;
        Ok(())
    }
}

/// Compute the value score.
///
/// Pure and monotonic: adding scenarios or edge cases at a fixed duration
/// never lowers the result. Negative or non-finite durations are treated
/// as zero; callers validate input before reaching here.
pub fn score(
    duration_secs: f64,
    scenarios: &[Scenario],
    edge_cases: &[Scenario],
    config: &ScoringConfig,
) -> f64 {
    let duration = if duration_secs.is_finite() {
        duration_secs.max(0.0)
    } else {
        0.0
    };
    let window_minutes = duration.max(config.min_window_secs) / SECS_PER_MINUTE;

    let points = config.scenario_weight * scenarios.len() as f64
        + config.edge_case_weight * edge_cases.len() as f64;

    round_to(points / window_minutes, SCORE_PRECISION).max(config.floor)
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
