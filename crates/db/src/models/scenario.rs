//! Scenario models and DTOs.

use dashscore_core::error::CoreError;
use dashscore_core::extraction::Scenario;
use dashscore_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `scenarios` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ScenarioRow {
    pub id: DbId,
    pub submission_id: DbId,
    pub scenario_type: String,
    pub start_secs: f64,
    pub end_secs: f64,
    pub confidence: f64,
    pub event_count: i32,
    pub is_edge_case: bool,
    pub approved: bool,
    pub created_at: Timestamp,
}

impl ScenarioRow {
    /// Convert back into the domain type.
    ///
    /// Fails if the stored `scenario_type` is not part of the taxonomy.
    pub fn to_scenario(&self) -> Result<Scenario, CoreError> {
        Ok(Scenario {
            scenario_type: self.scenario_type.parse()?,
            start_secs: self.start_secs,
            end_secs: self.end_secs,
            confidence: self.confidence,
            event_count: self.event_count.max(0) as u32,
            is_edge_case: self.is_edge_case,
            approved: self.approved,
        })
    }
}

/// DTO for inserting a freshly extracted scenario.
#[derive(Debug, Clone)]
pub struct CreateScenario {
    pub scenario_type: String,
    pub start_secs: f64,
    pub end_secs: f64,
    pub confidence: f64,
    pub event_count: i32,
    pub is_edge_case: bool,
}

impl From<&Scenario> for CreateScenario {
    fn from(scenario: &Scenario) -> Self {
        Self {
            scenario_type: scenario.scenario_type.as_str().to_string(),
            start_secs: scenario.start_secs,
            end_secs: scenario.end_secs,
            confidence: scenario.confidence,
            event_count: scenario.event_count.min(i32::MAX as u32) as i32,
            is_edge_case: scenario.is_edge_case,
        }
    }
}
