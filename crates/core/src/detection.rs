//! Detection taxonomy and raw-detection normalization.
//!
//! The video analysis service returns free-form labels with loosely
//! validated offsets. This module maps them onto the closed
//! [`ScenarioType`] set and produces a deterministically ordered list of
//! [`DetectionEvent`]s.

use std::cmp::Ordering;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Scenario types
// ---------------------------------------------------------------------------

/// Closed set of driving situations a scenario can be classified as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioType {
    LaneChange,
    Intersection,
    HardBrake,
    PedestrianNearMiss,
    CyclistInteraction,
    Merge,
    CutIn,
    EmergencyVehicle,
    WrongWayVehicle,
    AnimalCrossing,
    ConstructionZone,
    AdverseWeather,
}

impl ScenarioType {
    /// Every scenario type, in declaration order.
    pub const ALL: [ScenarioType; 12] = [
        Self::LaneChange,
        Self::Intersection,
        Self::HardBrake,
        Self::PedestrianNearMiss,
        Self::CyclistInteraction,
        Self::Merge,
        Self::CutIn,
        Self::EmergencyVehicle,
        Self::WrongWayVehicle,
        Self::AnimalCrossing,
        Self::ConstructionZone,
        Self::AdverseWeather,
    ];

    /// Stable identifier used in the database and JSON payloads.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LaneChange => "lane_change",
            Self::Intersection => "intersection",
            Self::HardBrake => "hard_brake",
            Self::PedestrianNearMiss => "pedestrian_near_miss",
            Self::CyclistInteraction => "cyclist_interaction",
            Self::Merge => "merge",
            Self::CutIn => "cut_in",
            Self::EmergencyVehicle => "emergency_vehicle",
            Self::WrongWayVehicle => "wrong_way_vehicle",
            Self::AnimalCrossing => "animal_crossing",
            Self::ConstructionZone => "construction_zone",
            Self::AdverseWeather => "adverse_weather",
        }
    }

    /// Map a raw analysis-service label onto a scenario type.
    ///
    /// Matching is case-insensitive and treats `-`, `_` and whitespace
    /// as the same separator. A handful of aliases the service is known
    /// to emit are accepted as well. Returns `None` for anything else.
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized = normalize_label(label);
        if let Some(found) = Self::ALL.iter().find(|t| t.as_str() == normalized) {
            return Some(*found);
        }
        LABEL_ALIASES
            .iter()
            .find(|(alias, _)| *alias == normalized)
            .map(|(_, t)| *t)
    }

    /// Lexical ordering on the stable identifier, used as a tie-breaker.
    pub fn lexical_cmp(self, other: Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl std::fmt::Display for ScenarioType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScenarioType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|t| t.as_str() == s)
            .copied()
            .ok_or_else(|| CoreError::Validation(format!("Unknown scenario type '{s}'")))
    }
}

/// Service labels that do not match an identifier directly.
const LABEL_ALIASES: &[(&str, ScenarioType)] = &[
    ("hard_braking", ScenarioType::HardBrake),
    ("sudden_brake", ScenarioType::HardBrake),
    ("emergency_brake", ScenarioType::HardBrake),
    ("near_miss", ScenarioType::PedestrianNearMiss),
    ("pedestrian", ScenarioType::PedestrianNearMiss),
    ("cyclist", ScenarioType::CyclistInteraction),
    ("bicycle", ScenarioType::CyclistInteraction),
    ("lane_departure", ScenarioType::LaneChange),
    ("junction", ScenarioType::Intersection),
    ("traffic_light", ScenarioType::Intersection),
    ("highway_merge", ScenarioType::Merge),
    ("ambulance", ScenarioType::EmergencyVehicle),
    ("fire_truck", ScenarioType::EmergencyVehicle),
    ("police_vehicle", ScenarioType::EmergencyVehicle),
    ("wrong_way", ScenarioType::WrongWayVehicle),
    ("animal", ScenarioType::AnimalCrossing),
    ("roadworks", ScenarioType::ConstructionZone),
    ("road_work", ScenarioType::ConstructionZone),
    ("rain", ScenarioType::AdverseWeather),
    ("snow", ScenarioType::AdverseWeather),
    ("fog", ScenarioType::AdverseWeather),
];

fn normalize_label(label: &str) -> String {
    label
        .trim()
        .to_ascii_lowercase()
        .split(|c: char| c == '-' || c == '_' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

// ---------------------------------------------------------------------------
// Detection events
// ---------------------------------------------------------------------------

/// One raw detection as returned by the analysis service, before
/// normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    pub label: String,
    pub start: f64,
    pub end: f64,
    pub confidence: f64,
}

/// A normalized detection: known type, ordered bounds, confidence in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionEvent {
    pub scenario_type: ScenarioType,
    pub start_secs: f64,
    pub end_secs: f64,
    pub confidence: f64,
}

impl DetectionEvent {
    /// Total ordering: start ascending, then type lexically, then end and
    /// confidence so equal-looking events still sort the same way every run.
    pub fn canonical_cmp(&self, other: &Self) -> Ordering {
        self.start_secs
            .total_cmp(&other.start_secs)
            .then_with(|| self.scenario_type.lexical_cmp(other.scenario_type))
            .then_with(|| self.end_secs.total_cmp(&other.end_secs))
            .then_with(|| self.confidence.total_cmp(&other.confidence))
    }
}

/// Result of normalizing a batch of raw detections.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedDetections {
    /// Events in canonical order.
    pub events: Vec<DetectionEvent>,
    /// Detections whose label is not part of the taxonomy.
    pub unknown_labels: usize,
    /// Detections with non-finite offsets or confidence.
    pub malformed: usize,
}

/// Normalize raw detections into canonically ordered events.
///
/// - Unknown labels and non-finite numbers are dropped and counted.
/// - Negative offsets clamp to zero; reversed spans are swapped.
/// - Confidence clamps to `[0, 1]`.
pub fn normalize_detections<I>(raw: I) -> NormalizedDetections
where
    I: IntoIterator<Item = RawDetection>,
{
    let mut out = NormalizedDetections::default();

    for detection in raw {
        if !detection.start.is_finite()
            || !detection.end.is_finite()
            || !detection.confidence.is_finite()
        {
            out.malformed += 1;
            continue;
        }
        let Some(scenario_type) = ScenarioType::from_label(&detection.label) else {
            out.unknown_labels += 1;
            continue;
        };

        let a = detection.start.max(0.0);
        let b = detection.end.max(0.0);
        out.events.push(DetectionEvent {
            scenario_type,
            start_secs: a.min(b),
            end_secs: a.max(b),
            confidence: detection.confidence.clamp(0.0, 1.0),
        });
    }

    out.events.sort_by(DetectionEvent::canonical_cmp);
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(label: &str, start: f64, end: f64, confidence: f64) -> RawDetection {
        RawDetection {
            label: label.to_string(),
            start,
            end,
            confidence,
        }
    }

    // -- ScenarioType --

    #[test]
    fn identifiers_round_trip_through_from_str() {
        for t in ScenarioType::ALL {
            assert_eq!(t.as_str().parse::<ScenarioType>().unwrap(), t);
        }
    }

    #[test]
    fn from_str_rejects_unknown() {
        assert!("drifting".parse::<ScenarioType>().is_err());
    }

    #[test]
    fn from_label_accepts_separator_variants() {
        assert_eq!(
            ScenarioType::from_label("hard-brake"),
            Some(ScenarioType::HardBrake)
        );
        assert_eq!(
            ScenarioType::from_label("Hard Brake"),
            Some(ScenarioType::HardBrake)
        );
        assert_eq!(
            ScenarioType::from_label("  PEDESTRIAN-near_miss "),
            Some(ScenarioType::PedestrianNearMiss)
        );
    }

    #[test]
    fn from_label_accepts_aliases() {
        assert_eq!(
            ScenarioType::from_label("hard braking"),
            Some(ScenarioType::HardBrake)
        );
        assert_eq!(
            ScenarioType::from_label("near-miss"),
            Some(ScenarioType::PedestrianNearMiss)
        );
        assert_eq!(
            ScenarioType::from_label("Fire Truck"),
            Some(ScenarioType::EmergencyVehicle)
        );
    }

    #[test]
    fn from_label_rejects_unknown() {
        assert_eq!(ScenarioType::from_label("parking"), None);
        assert_eq!(ScenarioType::from_label(""), None);
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&ScenarioType::PedestrianNearMiss).unwrap();
        assert_eq!(json, "\"pedestrian_near_miss\"");
    }

    // -- normalize_detections --

    #[test]
    fn normalize_orders_by_start_then_type() {
        let out = normalize_detections(vec![
            raw("merge", 5.0, 6.0, 0.9),
            raw("lane_change", 5.0, 7.0, 0.9),
            raw("hard_brake", 1.0, 2.0, 0.9),
        ]);
        let types: Vec<_> = out.events.iter().map(|e| e.scenario_type).collect();
        assert_eq!(
            types,
            vec![
                ScenarioType::HardBrake,
                ScenarioType::LaneChange,
                ScenarioType::Merge
            ]
        );
    }

    #[test]
    fn normalize_swaps_reversed_spans_and_clamps() {
        let out = normalize_detections(vec![raw("merge", 9.0, -2.0, 1.7)]);
        let event = out.events[0];
        assert_eq!(event.start_secs, 0.0);
        assert_eq!(event.end_secs, 9.0);
        assert_eq!(event.confidence, 1.0);
    }

    #[test]
    fn normalize_counts_dropped_detections() {
        let out = normalize_detections(vec![
            raw("teleport", 1.0, 2.0, 0.5),
            raw("merge", f64::NAN, 2.0, 0.5),
            raw("merge", 1.0, 2.0, 0.5),
        ]);
        assert_eq!(out.events.len(), 1);
        assert_eq!(out.unknown_labels, 1);
        assert_eq!(out.malformed, 1);
    }

    #[test]
    fn normalize_empty_input() {
        let out = normalize_detections(Vec::new());
        assert!(out.events.is_empty());
        assert_eq!(out.unknown_labels, 0);
        assert_eq!(out.malformed, 0);
    }
}
