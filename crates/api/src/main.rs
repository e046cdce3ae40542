use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use dashscore_pipeline::analysis::HttpVideoAnalyzer;
use dashscore_pipeline::config::PipelineConfig;
use dashscore_pipeline::orchestrator::{Capabilities, Orchestrator};
use dashscore_pipeline::postgres::{
    PgEarningsLedger, PgLeaseManager, PgScenarioStore, PgSubmissionStore,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dashscore_api::background;
use dashscore_api::config::ServerConfig;
use dashscore_api::router::build_app_router;
use dashscore_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "dashscore_api=debug,dashscore_pipeline=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    let pipeline_config = PipelineConfig::from_env().expect("Invalid pipeline configuration");
    tracing::info!(
        analysis_url = %pipeline_config.analysis.base_url,
        max_attempts = pipeline_config.retry.max_attempts,
        lease_secs = pipeline_config.lease_ttl.as_secs(),
        "Loaded pipeline configuration"
    );

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = dashscore_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    dashscore_db::health_check(&pool)
        .await
        .expect("Database health check failed");

    dashscore_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Pipeline ---
    let caps = Capabilities {
        analyzer: Arc::new(HttpVideoAnalyzer::new(pipeline_config.analysis.clone())),
        submissions: Arc::new(PgSubmissionStore::new(pool.clone())),
        scenarios: Arc::new(PgScenarioStore::new(pool.clone())),
        ledger: Arc::new(PgEarningsLedger::new(pool.clone())),
        leases: Arc::new(PgLeaseManager::new(pool.clone())),
    };
    let sweep_interval = pipeline_config.lease_sweep_interval;
    let orchestrator = Arc::new(Orchestrator::new(caps, pipeline_config));

    // --- Lease sweeper ---
    let sweeper_cancel = CancellationToken::new();
    let sweeper_handle = tokio::spawn(background::lease_sweeper::run(
        Arc::clone(&orchestrator),
        sweep_interval,
        sweeper_cancel.clone(),
    ));

    // --- App state ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        orchestrator,
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    sweeper_cancel.cancel();
    let _ = tokio::time::timeout(
        Duration::from_secs(config.shutdown_timeout_secs),
        sweeper_handle,
    )
    .await;
    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl-C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
