//! DocFlow Server: document ingestion pipeline
//!
//! Main entry point that wires all crates together and runs the ingestion
//! driver until shutdown.

use std::sync::Arc;

use tracing_subscriber::{EnvFilter, fmt};

use docflow_core::config::AppConfig;
use docflow_core::error::AppError;
use docflow_database::DatabasePool;
use docflow_ingestion::{IngestionOrchestrator, IngestionScheduler, StaleJobReconciler, analysis};

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from files and environment
fn load_configuration() -> Result<AppConfig, AppError> {
    let env = std::env::var("DOCFLOW_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load(&env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting DocFlow v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Database connection + migrations ─────────────────
    let db_pool = DatabasePool::connect(&config.database).await?;

    // ── Step 2: Stores and analysis client ───────────────────────
    let jobs = Arc::new(db_pool.jobs());
    let documents = Arc::new(db_pool.documents());
    let analysis_client = analysis::from_config(&config.analysis)?;

    // ── Step 3: Orchestrator and reconciler ──────────────────────
    let orchestrator =
        IngestionOrchestrator::new(jobs, documents, analysis_client, &config.ingestion);
    let reconciler =
        StaleJobReconciler::new(orchestrator.clone(), config.ingestion.staleness_threshold());
    tracing::info!(
        max_retries = config.ingestion.max_retries,
        base_backoff_ms = config.ingestion.base_backoff_ms,
        processing_delay_seconds = config.ingestion.processing_delay_seconds,
        staleness_threshold_seconds = config.ingestion.staleness_threshold_seconds,
        "Ingestion orchestrator initialized"
    );

    // ── Step 4: Startup recovery ─────────────────────────────────
    reconciler
        .startup_recovery(config.ingestion.resume_pending_on_startup)
        .await?;

    // ── Step 5: Start scheduled sweep ────────────────────────────
    let scheduler =
        IngestionScheduler::new(reconciler, config.ingestion.sweep_interval()).await?;
    scheduler.register_default_tasks().await?;
    scheduler.start().await?;

    tracing::info!("DocFlow ingestion driver running");

    // ── Step 6: Graceful shutdown ────────────────────────────────
    shutdown_signal().await;
    tracing::info!("Shutdown signal received, stopping...");

    if let Err(e) = scheduler.shutdown().await {
        tracing::error!("Scheduler shutdown error: {}", e);
    }
    db_pool.close().await;

    tracing::info!("DocFlow shut down gracefully");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
