//! Scenario and edge-case extraction.
//!
//! Groups detection events of the same [`ScenarioType`] whose spans
//! overlap, or sit within a configured gap of each other, into one
//! [`Scenario`]. Scenarios whose type is in the configured rare set, or
//! whose confidence exceeds the configured threshold, are flagged as edge
//! cases.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::detection::{DetectionEvent, ScenarioType};
use crate::error::CoreError;
use crate::threshold_validation::{validate_non_negative, validate_unit_range};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tunables for [`extract`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Maximum gap in seconds between two same-type events that still
    /// merge into one scenario.
    pub merge_gap_secs: f64,
    /// Events below this confidence are ignored.
    pub min_confidence: f64,
    /// Scenario types that are always edge cases.
    pub rare_types: Vec<ScenarioType>,
    /// Scenarios with a confidence strictly above this are edge cases
    /// regardless of type.
    pub edge_case_confidence: f64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            merge_gap_secs: 1.0,
            min_confidence: 0.0,
            rare_types: vec![
                ScenarioType::PedestrianNearMiss,
                ScenarioType::WrongWayVehicle,
                ScenarioType::EmergencyVehicle,
                ScenarioType::AnimalCrossing,
            ],
            edge_case_confidence: 0.95,
        }
    }
}

impl ExtractionConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_non_negative(self.merge_gap_secs, "merge_gap_secs")?;
        validate_unit_range(self.min_confidence, "min_confidence")?;
        validate_unit_range(self.edge_case_confidence, "edge_case_confidence")?;
        Ok(())
    }

    fn is_rare(&self, scenario_type: ScenarioType) -> bool {
        self.rare_types.contains(&scenario_type)
    }
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// A bounded, classified driving situation derived from one or more events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub scenario_type: ScenarioType,
    pub start_secs: f64,
    pub end_secs: f64,
    /// Maximum confidence among the merged events.
    pub confidence: f64,
    /// Number of detection events merged into this span.
    pub event_count: u32,
    pub is_edge_case: bool,
    /// Always `false` on extraction; set only by human moderation.
    pub approved: bool,
}

impl Scenario {
    /// Two scenarios are the same situation if type and bounds agree.
    pub fn same_identity(&self, other: &Scenario) -> bool {
        self.scenario_type == other.scenario_type
            && self.start_secs == other.start_secs
            && self.end_secs == other.end_secs
    }

    pub fn duration_secs(&self) -> f64 {
        self.end_secs - self.start_secs
    }

    /// Start ascending, tie-broken lexically by type.
    pub fn canonical_cmp(&self, other: &Self) -> Ordering {
        self.start_secs
            .total_cmp(&other.start_secs)
            .then_with(|| self.scenario_type.lexical_cmp(other.scenario_type))
            .then_with(|| self.end_secs.total_cmp(&other.end_secs))
    }
}

/// Result of [`extract`]. Every entry of `edge_cases` also appears in
/// `scenarios`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    pub scenarios: Vec<Scenario>,
    pub edge_cases: Vec<Scenario>,
}

impl Extraction {
    /// Rebuild an extraction from persisted scenarios, using each row's
    /// edge-case flag.
    pub fn from_scenarios(mut scenarios: Vec<Scenario>) -> Self {
        scenarios.sort_by(Scenario::canonical_cmp);
        let edge_cases = scenarios.iter().filter(|s| s.is_edge_case).cloned().collect();
        Self {
            scenarios,
            edge_cases,
        }
    }
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Derive scenarios and edge cases from detection events.
///
/// The input does not need to be pre-sorted; it is put into canonical
/// order first so identical event multisets always give identical output.
pub fn extract(events: &[DetectionEvent], config: &ExtractionConfig) -> Extraction {
    let mut ordered: Vec<DetectionEvent> = events
        .iter()
        .filter(|e| e.confidence >= config.min_confidence)
        .copied()
        .collect();
    ordered.sort_by(DetectionEvent::canonical_cmp);

    let mut scenarios: Vec<Scenario> = Vec::new();
    // Index of the most recent scenario per type; events arrive by start
    // ascending, so only the latest span of a type can still absorb one.
    let mut open: HashMap<ScenarioType, usize> = HashMap::new();

    for event in &ordered {
        if let Some(&idx) = open.get(&event.scenario_type) {
            let current = &mut scenarios[idx];
            if event.start_secs <= current.end_secs + config.merge_gap_secs {
                current.end_secs = current.end_secs.max(event.end_secs);
                current.confidence = current.confidence.max(event.confidence);
                current.event_count += 1;
                continue;
            }
        }

        open.insert(event.scenario_type, scenarios.len());
        scenarios.push(Scenario {
            scenario_type: event.scenario_type,
            start_secs: event.start_secs,
            end_secs: event.end_secs,
            confidence: event.confidence,
            event_count: 1,
            is_edge_case: false,
            approved: false,
        });
    }

    for scenario in &mut scenarios {
        scenario.is_edge_case = config.is_rare(scenario.scenario_type)
            || scenario.confidence > config.edge_case_confidence;
    }
    scenarios.sort_by(Scenario::canonical_cmp);

    let edge_cases = scenarios
        .iter()
        .filter(|s| s.is_edge_case)
        .cloned()
        .collect();

    Extraction {
        scenarios,
        edge_cases,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
