use std::str::FromStr;
use std::time::Duration;

use dashscore_core::detection::ScenarioType;
use dashscore_core::earnings::EarningsConfig;
use dashscore_core::error::CoreError;
use dashscore_core::extraction::ExtractionConfig;
use dashscore_core::threshold_validation::validate_positive;
use dashscore_core::value_score::ScoringConfig;

use crate::analysis::AnalysisClientConfig;
use crate::retry::RetryPolicy;

/// Pipeline configuration loaded from environment variables.
///
/// Every field has a default so a local instance starts with no env set.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub analysis: AnalysisClientConfig,
    /// Backoff for transient analysis failures.
    pub retry: RetryPolicy,
    /// Lifetime of a per-submission lease.
    pub lease_ttl: Duration,
    /// How often expired leases are swept.
    pub lease_sweep_interval: Duration,
    /// How long released lease rows are kept before the sweep deletes them.
    pub lease_retention: Duration,
    pub extraction: ExtractionConfig,
    pub scoring: ScoringConfig,
    pub earnings: EarningsConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            analysis: AnalysisClientConfig {
                base_url: "http://localhost:8090".into(),
                api_key: None,
                timeout: Duration::from_secs(120),
            },
            retry: RetryPolicy::default(),
            lease_ttl: Duration::from_secs(900),
            lease_sweep_interval: Duration::from_secs(60),
            lease_retention: Duration::from_secs(86_400),
            extraction: ExtractionConfig::default(),
            scoring: ScoringConfig::default(),
            earnings: EarningsConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                        | Default                  |
    /// |--------------------------------|--------------------------|
    /// | `ANALYSIS_SERVICE_URL`         | `http://localhost:8090`  |
    /// | `ANALYSIS_API_KEY`             | unset                    |
    /// | `ANALYSIS_TIMEOUT_SECS`        | `120`                    |
    /// | `ANALYSIS_MAX_ATTEMPTS`        | `4`                      |
    /// | `ANALYSIS_BACKOFF_INITIAL_MS`  | `1000`                   |
    /// | `ANALYSIS_BACKOFF_MAX_MS`      | `30000`                  |
    /// | `PIPELINE_LEASE_SECS`          | `900`                    |
    /// | `LEASE_SWEEP_INTERVAL_SECS`    | `60`                     |
    /// | `LEASE_RETENTION_SECS`         | `86400`                  |
    /// | `EXTRACT_MERGE_GAP_SECS`       | `1.0`                    |
    /// | `EXTRACT_MIN_CONFIDENCE`       | `0.0`                    |
    /// | `EDGE_CASE_TYPES`              | see below                |
    /// | `EDGE_CASE_CONFIDENCE`         | `0.95`                   |
    /// | `SCORE_SCENARIO_WEIGHT`        | `1.0`                    |
    /// | `SCORE_EDGE_CASE_WEIGHT`       | `3.0`                    |
    /// | `SCORE_FLOOR`                  | `0.0`                    |
    /// | `SCORE_MIN_WINDOW_SECS`        | `60.0`                   |
    /// | `EARNINGS_CURRENCY`            | `USD`                    |
    /// | `EARNINGS_RATE_PER_MINUTE`     | `0.10`                   |
    /// | `EARNINGS_PER_SCENARIO`        | `0.25`                   |
    /// | `EARNINGS_PER_EDGE_CASE`       | `2.00`                   |
    /// | `EARNINGS_MULTIPLIER_PER_POINT`| `0.10`                   |
    /// | `EARNINGS_MAX_MULTIPLIER`      | `3.0`                    |
    ///
    /// `EDGE_CASE_TYPES` defaults to
    /// `pedestrian_near_miss,wrong_way_vehicle,emergency_vehicle,animal_crossing`.
    pub fn from_env() -> Result<Self, CoreError> {
        let defaults = Self::default();

        let analysis = AnalysisClientConfig {
            base_url: std::env::var("ANALYSIS_SERVICE_URL").unwrap_or(defaults.analysis.base_url),
            api_key: std::env::var("ANALYSIS_API_KEY").ok().filter(|k| !k.is_empty()),
            timeout: Duration::from_secs(env_or(
                "ANALYSIS_TIMEOUT_SECS",
                defaults.analysis.timeout.as_secs(),
            )?),
        };

        let retry = RetryPolicy {
            max_attempts: env_or("ANALYSIS_MAX_ATTEMPTS", defaults.retry.max_attempts)?,
            initial_delay: Duration::from_millis(env_or(
                "ANALYSIS_BACKOFF_INITIAL_MS",
                defaults.retry.initial_delay.as_millis() as u64,
            )?),
            max_delay: Duration::from_millis(env_or(
                "ANALYSIS_BACKOFF_MAX_MS",
                defaults.retry.max_delay.as_millis() as u64,
            )?),
            multiplier: defaults.retry.multiplier,
        };

        let rare_types = match std::env::var("EDGE_CASE_TYPES") {
            Ok(raw) => parse_scenario_types(&raw)?,
            Err(_) => defaults.extraction.rare_types,
        };

        let extraction = ExtractionConfig {
            merge_gap_secs: env_or("EXTRACT_MERGE_GAP_SECS", defaults.extraction.merge_gap_secs)?,
            min_confidence: env_or("EXTRACT_MIN_CONFIDENCE", defaults.extraction.min_confidence)?,
            rare_types,
            edge_case_confidence: env_or(
                "EDGE_CASE_CONFIDENCE",
                defaults.extraction.edge_case_confidence,
            )?,
        };

        let scoring = ScoringConfig {
            scenario_weight: env_or("SCORE_SCENARIO_WEIGHT", defaults.scoring.scenario_weight)?,
            edge_case_weight: env_or("SCORE_EDGE_CASE_WEIGHT", defaults.scoring.edge_case_weight)?,
            floor: env_or("SCORE_FLOOR", defaults.scoring.floor)?,
            min_window_secs: env_or("SCORE_MIN_WINDOW_SECS", defaults.scoring.min_window_secs)?,
        };

        let earnings = EarningsConfig {
            currency: std::env::var("EARNINGS_CURRENCY").unwrap_or(defaults.earnings.currency),
            rate_per_minute: env_or("EARNINGS_RATE_PER_MINUTE", defaults.earnings.rate_per_minute)?,
            per_scenario: env_or("EARNINGS_PER_SCENARIO", defaults.earnings.per_scenario)?,
            per_edge_case: env_or("EARNINGS_PER_EDGE_CASE", defaults.earnings.per_edge_case)?,
            multiplier_per_point: env_or(
                "EARNINGS_MULTIPLIER_PER_POINT",
                defaults.earnings.multiplier_per_point,
            )?,
            max_multiplier: env_or("EARNINGS_MAX_MULTIPLIER", defaults.earnings.max_multiplier)?,
        };

        let config = Self {
            analysis,
            retry,
            lease_ttl: Duration::from_secs(env_or(
                "PIPELINE_LEASE_SECS",
                defaults.lease_ttl.as_secs(),
            )?),
            lease_sweep_interval: Duration::from_secs(env_or(
                "LEASE_SWEEP_INTERVAL_SECS",
                defaults.lease_sweep_interval.as_secs(),
            )?),
            lease_retention: Duration::from_secs(env_or(
                "LEASE_RETENTION_SECS",
                defaults.lease_retention.as_secs(),
            )?),
            extraction,
            scoring,
            earnings,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check every threshold, and that a lease outlives the slowest
    /// possible analysis step.
    pub fn validate(&self) -> Result<(), CoreError> {
        self.extraction.validate()?;
        self.scoring.validate()?;
        self.earnings.validate()?;

        if self.retry.max_attempts == 0 {
            return Err(CoreError::Validation(
                "ANALYSIS_MAX_ATTEMPTS must be at least 1".into(),
            ));
        }
        validate_positive(self.retry.multiplier, "retry multiplier")?;
        validate_positive(self.analysis.timeout.as_secs_f64(), "ANALYSIS_TIMEOUT_SECS")?;
        validate_positive(self.lease_sweep_interval.as_secs_f64(), "LEASE_SWEEP_INTERVAL_SECS")?;
        validate_positive(self.lease_retention.as_secs_f64(), "LEASE_RETENTION_SECS")?;

        let worst_case = self.worst_case_analysis();
        if self.lease_ttl <= worst_case {
            return Err(CoreError::Validation(format!(
                "PIPELINE_LEASE_SECS ({}s) must exceed the worst-case analysis time ({}s)",
                self.lease_ttl.as_secs(),
                worst_case.as_secs(),
            )));
        }
        Ok(())
    }

    /// Every attempt timing out plus every backoff sleep.
    pub fn worst_case_analysis(&self) -> Duration {
        self.analysis.timeout * self.retry.max_attempts.max(1) + self.retry.total_backoff()
    }
}

/// Read and parse an env var, falling back to `default` when unset.
fn env_or<T: FromStr>(name: &str, default: T) -> Result<T, CoreError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| CoreError::Validation(format!("{name} has an invalid value: {raw:?}"))),
        Err(_) => Ok(default),
    }
}

/// Parse a comma-separated list of scenario type labels.
///
/// Labels are matched like service labels, aliases included. An empty
/// string yields an empty set, disabling type-based edge cases.
pub fn parse_scenario_types(raw: &str) -> Result<Vec<ScenarioType>, CoreError> {
    let mut types = Vec::new();
    for label in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let scenario_type = ScenarioType::from_label(label).ok_or_else(|| {
            CoreError::Validation(format!("EDGE_CASE_TYPES: unknown scenario type '{label}'"))
        })?;
        if !types.contains(&scenario_type) {
            types.push(scenario_type);
        }
    }
    Ok(types)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn defaults_are_valid() {
        PipelineConfig::default().validate().unwrap();
    }

    #[test]
    fn lease_must_outlive_analysis() {
        let config = PipelineConfig {
            lease_ttl: Duration::from_secs(60),
            ..Default::default()
        };
        assert_matches!(config.validate(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn worst_case_counts_timeouts_and_backoff() {
        let config = PipelineConfig::default();
        // 4 x 120s timeouts + 1 + 2 + 4 seconds of backoff.
        assert_eq!(config.worst_case_analysis(), Duration::from_secs(487));
    }

    #[test]
    fn zero_lease_retention_rejected() {
        let config = PipelineConfig {
            lease_retention: Duration::ZERO,
            ..Default::default()
        };
        assert_matches!(config.validate(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn zero_attempts_rejected() {
        let mut config = PipelineConfig::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn parse_types_accepts_aliases_and_dedups() {
        let types = parse_scenario_types("wrong-way vehicle, near miss,wrong_way_vehicle").unwrap();
        assert_eq!(
            types,
            vec![ScenarioType::WrongWayVehicle, ScenarioType::PedestrianNearMiss]
        );
    }

    #[test]
    fn parse_types_empty_disables_rare_set() {
        assert!(parse_scenario_types("").unwrap().is_empty());
    }

    #[test]
    fn parse_types_rejects_unknown() {
        assert_matches!(
            parse_scenario_types("lane_change,teleport"),
            Err(CoreError::Validation(_))
        );
    }
}
