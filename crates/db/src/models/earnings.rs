//! Earnings ledger models and DTOs.
//!
//! Amounts are persisted in minor units so the ledger never accumulates
//! floating-point drift; conversion happens at the boundary.

use dashscore_core::earnings::EarningsResult;
use dashscore_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// Ledger status for entries awaiting external settlement.
pub const STATUS_PENDING_PAYMENT: &str = "pending_payment";

/// A row from the `earnings_ledger` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct EarningsEntry {
    pub id: DbId,
    pub driver_id: DbId,
    pub submission_id: DbId,
    pub currency: String,
    pub total_cents: i64,
    pub base_duration_cents: i64,
    pub scenario_count_cents: i64,
    pub edge_case_bonus_cents: i64,
    pub multiplier_uplift_cents: i64,
    pub value_score_multiplier: f64,
    pub value_score: f64,
    pub duration_secs: f64,
    pub scenario_count: i32,
    pub edge_case_count: i32,
    pub status: String,
    pub supersedes_id: Option<DbId>,
    pub created_at: Timestamp,
}

/// DTO for appending a ledger entry.
#[derive(Debug, Clone)]
pub struct CreateEarningsEntry {
    pub driver_id: DbId,
    pub submission_id: DbId,
    pub currency: String,
    pub total_cents: i64,
    pub base_duration_cents: i64,
    pub scenario_count_cents: i64,
    pub edge_case_bonus_cents: i64,
    pub multiplier_uplift_cents: i64,
    pub value_score_multiplier: f64,
    pub value_score: f64,
    pub duration_secs: f64,
    pub scenario_count: i32,
    pub edge_case_count: i32,
    pub supersedes_id: Option<DbId>,
}

impl CreateEarningsEntry {
    /// Build a ledger entry from a priced result.
    pub fn from_result(
        submission_id: DbId,
        result: &EarningsResult,
        supersedes_id: Option<DbId>,
    ) -> Self {
        Self {
            driver_id: result.driver_id,
            submission_id,
            currency: result.currency.clone(),
            total_cents: to_cents(result.total),
            base_duration_cents: to_cents(result.breakdown.base_duration),
            scenario_count_cents: to_cents(result.breakdown.scenario_count),
            edge_case_bonus_cents: to_cents(result.breakdown.edge_case_bonus),
            multiplier_uplift_cents: to_cents(result.breakdown.multiplier_uplift),
            value_score_multiplier: result.breakdown.value_score_multiplier,
            value_score: result.value_score,
            duration_secs: result.duration_secs,
            scenario_count: result.scenario_count as i32,
            edge_case_count: result.edge_case_count as i32,
            supersedes_id,
        }
    }
}

/// Convert an amount already rounded to cents into minor units.
pub fn to_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

#[cfg(test)]
mod tests {
    use dashscore_core::earnings::{calculate, EarningsConfig};

    use super::*;

    #[test]
    fn to_cents_survives_binary_fractions() {
        assert_eq!(to_cents(0.29), 29);
        assert_eq!(to_cents(4.5), 450);
        assert_eq!(to_cents(0.0), 0);
    }

    #[test]
    fn from_result_copies_breakdown() {
        let result = calculate(300.0, &[], &[], 0.0, 11, &EarningsConfig::default()).unwrap();
        let entry = CreateEarningsEntry::from_result(5, &result, Some(3));

        assert_eq!(entry.driver_id, 11);
        assert_eq!(entry.submission_id, 5);
        assert_eq!(entry.total_cents, 50);
        assert_eq!(entry.base_duration_cents, 50);
        assert_eq!(entry.supersedes_id, Some(3));
        assert_eq!(entry.currency, "USD");
    }
}
