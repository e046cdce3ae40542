//! Driver earnings pricing.
//!
//! Converts footage duration, scenario composition and value score into a
//! payout with an itemized breakdown:
//!
//! ```text
//! subtotal = base_duration + scenario_count + edge_case_bonus   (each rounded)
//! total    = round_half_up(subtotal * multiplier, 2)
//! uplift   = total - subtotal
//! ```
//!
//! where `multiplier = min(1 + value_score * multiplier_per_point, max_multiplier)`.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::extraction::Scenario;
use crate::threshold_validation::validate_non_negative;
use crate::types::DbId;
use crate::value_score::SECS_PER_MINUTE;

/// Nudge applied before flooring so values whose binary form sits a hair
/// below a half cent still round up.
const CURRENCY_EPSILON: f64 = 1e-9;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Price list for [`calculate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarningsConfig {
    /// ISO 4217 code stamped on every result.
    pub currency: String,
    /// Paid per minute of footage.
    pub rate_per_minute: f64,
    /// Paid per extracted scenario.
    pub per_scenario: f64,
    /// Paid per edge case, in addition to its scenario amount.
    pub per_edge_case: f64,
    /// Multiplier growth per value-score point.
    pub multiplier_per_point: f64,
    /// Upper bound on the multiplier.
    pub max_multiplier: f64,
}

impl Default for EarningsConfig {
    fn default() -> Self {
        Self {
            currency: "USD".to_string(),
            rate_per_minute: 0.10,
            per_scenario: 0.25,
            per_edge_case: 2.00,
            multiplier_per_point: 0.10,
            max_multiplier: 3.0,
        }
    }
}

impl EarningsConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(CoreError::Validation(format!(
                "currency must be a three-letter ISO code, got '{}'",
                self.currency
            )));
        }
        validate_non_negative(self.rate_per_minute, "rate_per_minute")?;
        validate_non_negative(self.per_scenario, "per_scenario")?;
        validate_non_negative(self.per_edge_case, "per_edge_case")?;
        validate_non_negative(self.multiplier_per_point, "multiplier_per_point")?;
        if !self.max_multiplier.is_finite() || self.max_multiplier < 1.0 {
            return Err(CoreError::Validation(format!(
                "max_multiplier must be at least 1.0, got {}",
                self.max_multiplier
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Itemized payout. Amounts are in currency units rounded to cents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarningsBreakdown {
    pub base_duration: f64,
    pub scenario_count: f64,
    pub edge_case_bonus: f64,
    /// Factor applied to the pre-multiplier subtotal.
    pub value_score_multiplier: f64,
    /// Amount the multiplier added on top of the subtotal. The four
    /// amounts always sum to the total.
    pub multiplier_uplift: f64,
}

/// A priced payout for one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarningsResult {
    pub driver_id: DbId,
    pub currency: String,
    pub total: f64,
    pub breakdown: EarningsBreakdown,
    pub duration_secs: f64,
    pub scenario_count: u32,
    pub edge_case_count: u32,
    pub value_score: f64,
}

// ---------------------------------------------------------------------------
// Pricing
// ---------------------------------------------------------------------------

/// Price a submission.
///
/// Fails with `CoreError::Validation` when the duration or value score is
/// negative or non-finite, or when an edge case is not one of the given
/// scenarios. The total is never negative.
pub fn calculate(
    duration_secs: f64,
    scenarios: &[Scenario],
    edge_cases: &[Scenario],
    value_score: f64,
    driver_id: DbId,
    config: &EarningsConfig,
) -> Result<EarningsResult, CoreError> {
    validate_inputs(duration_secs, scenarios, edge_cases, value_score)?;

    // Lines are rounded first so the breakdown always sums to the total.
    let base = round_currency(duration_secs / SECS_PER_MINUTE * config.rate_per_minute);
    let per_scenario = round_currency(scenarios.len() as f64 * config.per_scenario);
    let edge_bonus = round_currency(edge_cases.len() as f64 * config.per_edge_case);
    let subtotal = round_currency(base + per_scenario + edge_bonus);

    let multiplier = (1.0 + value_score * config.multiplier_per_point)
        .min(config.max_multiplier)
        .max(1.0);
    let total = round_currency(subtotal * multiplier);
    let uplift = round_currency(total - subtotal);

    Ok(EarningsResult {
        driver_id,
        currency: config.currency.clone(),
        total,
        breakdown: EarningsBreakdown {
            base_duration: base,
            scenario_count: per_scenario,
            edge_case_bonus: edge_bonus,
            value_score_multiplier: multiplier,
            multiplier_uplift: uplift,
        },
        duration_secs,
        scenario_count: scenarios.len() as u32,
        edge_case_count: edge_cases.len() as u32,
        value_score,
    })
}

/// Round a non-negative amount to two decimals, halves rounding up.
pub fn round_currency(value: f64) -> f64 {
    ((value.max(0.0) * 100.0) + 0.5 + CURRENCY_EPSILON).floor() / 100.0
}

fn validate_inputs(
    duration_secs: f64,
    scenarios: &[Scenario],
    edge_cases: &[Scenario],
    value_score: f64,
) -> Result<(), CoreError> {
    validate_non_negative(duration_secs, "duration_secs")?;
    validate_non_negative(value_score, "value_score")?;

    if edge_cases.len() > scenarios.len() {
        return Err(CoreError::Validation(format!(
            "{} edge cases supplied for only {} scenarios",
            edge_cases.len(),
            scenarios.len()
        )));
    }
    if let Some(orphan) = edge_cases
        .iter()
        .find(|e| !scenarios.iter().any(|s| s.same_identity(e)))
    {
        return Err(CoreError::Validation(format!(
            "edge case {} at {}..{}s is not in the scenario list",
            orphan.scenario_type, orphan.start_secs, orphan.end_secs
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::detection::ScenarioType;

    fn scenario(t: ScenarioType, start: f64, edge: bool) -> Scenario {
        Scenario {
            scenario_type: t,
            start_secs: start,
            end_secs: start + 2.0,
            confidence: 0.7,
            event_count: 1,
            is_edge_case: edge,
            approved: false,
        }
    }

    // -- round_currency --

    #[test]
    fn rounds_half_up() {
        assert_eq!(round_currency(1.005), 1.01);
        assert_eq!(round_currency(2.675), 2.68);
        assert_eq!(round_currency(0.125), 0.13);
        assert_eq!(round_currency(0.124), 0.12);
    }

    #[test]
    fn rounding_never_goes_negative() {
        assert_eq!(round_currency(-3.0), 0.0);
        assert_eq!(round_currency(0.0), 0.0);
    }

    // -- calculate --

    #[test]
    fn zero_detections_pays_base_only() {
        let config = EarningsConfig::default();
        let result = calculate(120.0, &[], &[], 0.0, 7, &config).unwrap();

        assert_eq!(result.breakdown.base_duration, 0.20);
        assert_eq!(result.breakdown.scenario_count, 0.0);
        assert_eq!(result.breakdown.edge_case_bonus, 0.0);
        assert_eq!(result.breakdown.value_score_multiplier, 1.0);
        assert_eq!(result.breakdown.multiplier_uplift, 0.0);
        assert_eq!(result.total, result.breakdown.base_duration);
        assert_eq!(result.driver_id, 7);
        assert_eq!(result.currency, "USD");
    }

    #[test]
    fn full_breakdown() {
        let config = EarningsConfig::default();
        let edge = scenario(ScenarioType::PedestrianNearMiss, 30.0, true);
        let scenarios = vec![
            scenario(ScenarioType::HardBrake, 10.0, false),
            edge.clone(),
        ];
        let result = calculate(300.0, &scenarios, &[edge], 5.0, 1, &config).unwrap();

        // base 5 min * 0.10 = 0.50; 2 * 0.25 = 0.50; 1 * 2.00 = 2.00
        assert_eq!(result.breakdown.base_duration, 0.50);
        assert_eq!(result.breakdown.scenario_count, 0.50);
        assert_eq!(result.breakdown.edge_case_bonus, 2.00);
        // multiplier 1 + 5 * 0.1 = 1.5; 3.00 * 1.5 = 4.50
        assert_eq!(result.breakdown.value_score_multiplier, 1.5);
        assert_eq!(result.total, 4.50);
        assert_eq!(result.breakdown.multiplier_uplift, 1.50);
        assert_eq!(result.scenario_count, 2);
        assert_eq!(result.edge_case_count, 1);
    }

    #[test]
    fn sub_cent_prices_keep_breakdown_summing_to_total() {
        let config = EarningsConfig {
            rate_per_minute: 0.004,
            per_scenario: 0.004,
            per_edge_case: 0.005,
            ..Default::default()
        };
        let edge = scenario(ScenarioType::WrongWayVehicle, 20.0, true);
        let scenarios = vec![scenario(ScenarioType::HardBrake, 5.0, false), edge.clone()];

        for value_score in [0.0, 0.37, 2.5, 11.0] {
            let result = calculate(60.0, &scenarios, &[edge.clone()], value_score, 1, &config)
                .unwrap();
            let b = &result.breakdown;
            let summed =
                b.base_duration + b.scenario_count + b.edge_case_bonus + b.multiplier_uplift;
            assert_eq!((summed * 100.0).round(), (result.total * 100.0).round());
            assert!(b.multiplier_uplift >= 0.0);
        }
    }

    #[test]
    fn multiplier_is_capped() {
        let config = EarningsConfig::default();
        let result = calculate(60.0, &[], &[], 1000.0, 1, &config).unwrap();
        assert_eq!(result.breakdown.value_score_multiplier, config.max_multiplier);
        assert_eq!(result.total, 0.30);
    }

    #[test]
    fn total_never_negative() {
        let config = EarningsConfig {
            rate_per_minute: 0.0,
            per_scenario: 0.0,
            per_edge_case: 0.0,
            ..Default::default()
        };
        let result = calculate(0.0, &[], &[], 0.0, 1, &config).unwrap();
        assert!(result.total >= 0.0);
    }

    #[test]
    fn rejects_negative_duration() {
        let config = EarningsConfig::default();
        assert_matches!(
            calculate(-1.0, &[], &[], 0.0, 1, &config),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn rejects_negative_value_score() {
        let config = EarningsConfig::default();
        assert_matches!(
            calculate(10.0, &[], &[], -0.5, 1, &config),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn rejects_edge_case_missing_from_scenarios() {
        let config = EarningsConfig::default();
        let scenarios = vec![scenario(ScenarioType::HardBrake, 0.0, false)];
        let orphan = scenario(ScenarioType::AnimalCrossing, 50.0, true);
        let err = calculate(60.0, &scenarios, &[orphan], 0.0, 1, &config).unwrap_err();
        assert!(err.to_string().contains("animal_crossing"));
    }

    #[test]
    fn rejects_more_edge_cases_than_scenarios() {
        let config = EarningsConfig::default();
        let s = scenario(ScenarioType::HardBrake, 0.0, true);
        assert!(calculate(60.0, &[s.clone()], &[s.clone(), s], 0.0, 1, &config).is_err());
    }

    #[test]
    fn identical_inputs_give_identical_results() {
        let config = EarningsConfig::default();
        let scenarios = vec![
            scenario(ScenarioType::HardBrake, 3.0, false),
            scenario(ScenarioType::Merge, 9.0, false),
        ];
        let a = calculate(187.0, &scenarios, &[], 1.3333, 4, &config).unwrap();
        let b = calculate(187.0, &scenarios, &[], 1.3333, 4, &config).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn config_validation() {
        assert!(EarningsConfig::default().validate().is_ok());
        let bad = EarningsConfig {
            currency: "usd".into(),
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        let bad = EarningsConfig {
            max_multiplier: 0.5,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
