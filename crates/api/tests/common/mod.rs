#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use dashscore_core::detection::{DetectionEvent, NormalizedDetections};
use dashscore_pipeline::capabilities::{SubmissionRecord, VideoAnalyzer};
use dashscore_pipeline::config::PipelineConfig;
use dashscore_pipeline::error::AnalysisError;
use dashscore_pipeline::lease::InMemoryLeaseManager;
use dashscore_pipeline::memory::{
    InMemoryEarningsLedger, InMemoryScenarioStore, InMemorySubmissionStore,
};
use dashscore_pipeline::orchestrator::{Capabilities, Orchestrator};
use dashscore_pipeline::retry::RetryPolicy;
use http_body_util::BodyExt;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tower::ServiceExt;

use dashscore_api::config::ServerConfig;
use dashscore_api::router::build_app_router;
use dashscore_api::state::AppState;

pub const DRIVER_ID: i64 = 7;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 1,
    }
}

/// Pipeline configuration with instant retries.
pub fn test_pipeline_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.retry = RetryPolicy {
        max_attempts: 2,
        initial_delay: Duration::ZERO,
        max_delay: Duration::ZERO,
        multiplier: 2.0,
    };
    config.analysis.timeout = Duration::from_secs(5);
    config
}

/// A pool that never connects: nothing reachable listens on port 1. The
/// pipeline endpoints run on in-memory stores, so only `/health` touches it.
pub fn unreachable_pool() -> PgPool {
    PgPoolOptions::new()
        .acquire_timeout(Duration::from_millis(250))
        .connect_lazy("postgres://dashscore@127.0.0.1:1/dashscore_test")
        .expect("lazy pool")
}

// ---------------------------------------------------------------------------
// Analyzer fakes
// ---------------------------------------------------------------------------

/// Always returns the same detections.
pub struct FixedAnalyzer(pub Vec<DetectionEvent>);

#[async_trait]
impl VideoAnalyzer for FixedAnalyzer {
    async fn analyze(
        &self,
        _footage_location: &str,
    ) -> Result<NormalizedDetections, AnalysisError> {
        Ok(NormalizedDetections {
            events: self.0.clone(),
            unknown_labels: 0,
            malformed: 0,
        })
    }
}

/// Always fails with the same error.
pub struct FailingAnalyzer(pub AnalysisError);

#[async_trait]
impl VideoAnalyzer for FailingAnalyzer {
    async fn analyze(
        &self,
        _footage_location: &str,
    ) -> Result<NormalizedDetections, AnalysisError> {
        Err(self.0.clone())
    }
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

pub struct TestApp {
    pub router: Router,
    pub submissions: Arc<InMemorySubmissionStore>,
    pub scenarios: Arc<InMemoryScenarioStore>,
    pub ledger: Arc<InMemoryEarningsLedger>,
}

impl TestApp {
    pub async fn add_submission(&self, id: i64, anonymized: bool, duration_secs: f64) {
        self.submissions
            .insert(SubmissionRecord {
                id,
                driver_id: DRIVER_ID,
                duration_secs,
                anonymized,
                footage_location: format!("s3://footage/{id}.mp4"),
            })
            .await;
    }
}

/// Build the full application router over in-memory pipeline capabilities.
pub fn build_test_app(analyzer: Arc<dyn VideoAnalyzer>) -> TestApp {
    let submissions = Arc::new(InMemorySubmissionStore::new());
    let scenarios = Arc::new(InMemoryScenarioStore::new());
    let ledger = Arc::new(InMemoryEarningsLedger::new());

    let caps = Capabilities {
        analyzer,
        submissions: submissions.clone(),
        scenarios: scenarios.clone(),
        ledger: ledger.clone(),
        leases: Arc::new(InMemoryLeaseManager::new()),
    };

    let config = test_config();
    let state = AppState {
        pool: unreachable_pool(),
        config: Arc::new(config.clone()),
        orchestrator: Arc::new(Orchestrator::new(caps, test_pipeline_config())),
    };

    TestApp {
        router: build_app_router(state, &config),
        submissions,
        scenarios,
        ledger,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response {
    send(app, Method::GET, uri).await
}

pub async fn post(app: Router, uri: &str) -> Response {
    send(app, Method::POST, uri).await
}

async fn send(app: Router, method: Method, uri: &str) -> Response {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
