//! Integration tests for the scenario, earnings and lease repositories.
//!
//! These run against a real PostgreSQL instance and are ignored unless
//! invoked with `cargo test -- --ignored` and `DATABASE_URL` set.

use dashscore_db::models::earnings::CreateEarningsEntry;
use dashscore_db::models::scenario::CreateScenario;
use dashscore_db::repositories::{EarningsRepo, PipelineLeaseRepo, ScenarioRepo, SubmissionRepo};
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn insert_submission(pool: &PgPool, driver_id: i64, anonymized: bool) -> i64 {
    sqlx::query_scalar::<_, i64>(
        "INSERT INTO submissions (driver_id, duration_secs, anonymized, footage_location) \
         VALUES ($1, 120.0, $2, 's3://footage/test.mp4') RETURNING id",
    )
    .bind(driver_id)
    .bind(anonymized)
    .fetch_one(pool)
    .await
    .unwrap()
}

fn new_scenario(scenario_type: &str, start: f64) -> CreateScenario {
    CreateScenario {
        scenario_type: scenario_type.to_string(),
        start_secs: start,
        end_secs: start + 2.0,
        confidence: 0.8,
        event_count: 1,
        is_edge_case: false,
    }
}

fn new_entry(
    driver_id: i64,
    submission_id: i64,
    supersedes_id: Option<i64>,
) -> CreateEarningsEntry {
    CreateEarningsEntry {
        driver_id,
        submission_id,
        currency: "USD".to_string(),
        total_cents: 120,
        base_duration_cents: 20,
        scenario_count_cents: 100,
        edge_case_bonus_cents: 0,
        multiplier_uplift_cents: 0,
        value_score_multiplier: 1.0,
        value_score: 0.0,
        duration_secs: 120.0,
        scenario_count: 4,
        edge_case_count: 0,
        supersedes_id,
    }
}

// ---------------------------------------------------------------------------
// Submissions
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn find_submission_by_id(pool: PgPool) {
    let id = insert_submission(&pool, 9, true).await;
    let found = SubmissionRepo::find_by_id(&pool, id).await.unwrap().unwrap();
    assert_eq!(found.driver_id, 9);
    assert!(found.anonymized);

    assert!(SubmissionRepo::find_by_id(&pool, id + 1000).await.unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn replace_all_discards_previous_run(pool: PgPool) {
    let id = insert_submission(&pool, 1, true).await;

    let first = [new_scenario("hard_brake", 1.0), new_scenario("merge", 4.0)];
    ScenarioRepo::replace_all(&pool, id, &first).await.unwrap();
    let rows = ScenarioRepo::replace_all(&pool, id, &[new_scenario("cut_in", 9.0)])
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);

    let listed = ScenarioRepo::list_for_submission(&pool, id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].scenario_type, "cut_in");
    assert!(!listed[0].approved);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn delete_all_is_idempotent(pool: PgPool) {
    let id = insert_submission(&pool, 1, true).await;
    ScenarioRepo::replace_all(&pool, id, &[new_scenario("hard_brake", 1.0)])
        .await
        .unwrap();

    assert_eq!(ScenarioRepo::delete_all(&pool, id).await.unwrap(), 1);
    assert_eq!(ScenarioRepo::delete_all(&pool, id).await.unwrap(), 0);
    assert!(ScenarioRepo::list_for_submission(&pool, id).await.unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Earnings ledger
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn ledger_appends_and_supersedes(pool: PgPool) {
    let id = insert_submission(&pool, 3, true).await;

    let first = EarningsRepo::append(&pool, &new_entry(3, id, None)).await.unwrap();
    assert_eq!(first.status, "pending_payment");

    let second = EarningsRepo::append(&pool, &new_entry(3, id, Some(first.id)))
        .await
        .unwrap();
    assert_eq!(second.supersedes_id, Some(first.id));

    let latest = EarningsRepo::latest_for_submission(&pool, id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.id, second.id);

    let listed = EarningsRepo::list_for_driver(&pool, 3).await.unwrap();
    assert_eq!(listed.len(), 2);
}

// ---------------------------------------------------------------------------
// Leases
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn lease_is_exclusive_until_released(pool: PgPool) {
    let id = insert_submission(&pool, 1, true).await;

    let lease = PipelineLeaseRepo::acquire(&pool, id, "run-a", 60.0).await.unwrap();
    assert!(lease.is_some());
    assert!(PipelineLeaseRepo::acquire(&pool, id, "run-b", 60.0)
        .await
        .unwrap()
        .is_none());

    assert!(!PipelineLeaseRepo::release(&pool, id, "run-b").await.unwrap());
    assert!(PipelineLeaseRepo::release(&pool, id, "run-a").await.unwrap());

    assert!(PipelineLeaseRepo::acquire(&pool, id, "run-b", 60.0)
        .await
        .unwrap()
        .is_some());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn expired_lease_can_be_taken_over(pool: PgPool) {
    let id = insert_submission(&pool, 1, true).await;

    PipelineLeaseRepo::acquire(&pool, id, "crashed", 0.0).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    let lease = PipelineLeaseRepo::acquire(&pool, id, "fresh", 60.0)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(lease.holder, "fresh");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn purge_deletes_only_old_released_leases(pool: PgPool) {
    let old = insert_submission(&pool, 1, true).await;
    let live = insert_submission(&pool, 1, true).await;

    PipelineLeaseRepo::acquire(&pool, old, "done", 60.0).await.unwrap();
    PipelineLeaseRepo::release(&pool, old, "done").await.unwrap();
    PipelineLeaseRepo::acquire(&pool, live, "running", 60.0).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    assert_eq!(PipelineLeaseRepo::purge_released(&pool, 3600.0).await.unwrap(), 0);
    assert_eq!(PipelineLeaseRepo::purge_released(&pool, 0.0).await.unwrap(), 1);

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pipeline_leases")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(remaining, 1);
    assert!(PipelineLeaseRepo::get_active(&pool, live).await.unwrap().is_some());
}
