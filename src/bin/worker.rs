//! Candlecast Worker
//!
//! Runs the ingestion and forecast cycle on the configured cadence and
//! serves `/health` and `/metrics`.

use candlecast::config::{Config, Environment, StoreBackend};
use candlecast::core::clock::SystemClock;
use candlecast::core::http::{start_server, AppState, HealthStatus};
use candlecast::core::runtime::CycleRuntime;
use candlecast::core::scheduler::CycleScheduler;
use candlecast::db::{InMemoryStore, QuestDatabase, TimeSeriesStore};
use candlecast::forecast::ModelRepository;
use candlecast::jobs::context::PipelineContext;
use candlecast::logging;
use candlecast::metrics::Metrics;
use candlecast::services::BinanceMarketData;
use dotenvy::dotenv;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

const STORE_CONNECT_ATTEMPTS: usize = 5;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env if present
    dotenv().ok();

    logging::init_logging(Environment::from_env());

    let config = match Config::from_env() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            error!(error = %e, "Invalid configuration, refusing to start");
            return Err(e.into());
        }
    };

    info!("Starting Candlecast Worker");
    info!(environment = %config.environment, "Environment");
    info!(
        symbols = ?config.symbols.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
        timeframe = %config.timeframe,
        lookback_days = config.lookback_days,
        horizon = config.forecast_horizon,
        cadence = ?config.cadence,
        concurrency = config.worker_concurrency,
        "Pipeline configuration"
    );

    let metrics = Arc::new(Metrics::new()?);

    let store: Arc<dyn TimeSeriesStore> = match &config.store {
        StoreBackend::QuestDb { url } => {
            info!("Initializing QuestDB connection...");
            let db = QuestDatabase::connect_with_retry(url, config.store_timeout, STORE_CONNECT_ATTEMPTS)
                .await
                .map_err(|e| format!("QuestDB connection required for worker: {}", e))?;
            info!("QuestDB connected");
            Arc::new(db)
        }
        StoreBackend::Memory => {
            warn!("Using the in-memory store; nothing survives a restart");
            Arc::new(InMemoryStore::new())
        }
    };
    metrics
        .database_connected
        .set(if store.is_connected().await { 1.0 } else { 0.0 });

    tokio::fs::create_dir_all(&config.snapshot_dir)
        .await
        .map_err(|e| format!("Cannot create snapshot directory {}: {}", config.snapshot_dir.display(), e))?;

    let source = Arc::new(BinanceMarketData::new(&config.market_data_url, config.source_timeout)?);
    let models = Arc::new(ModelRepository::new(config.models_dir.clone()));

    let context = Arc::new(PipelineContext::new(
        config.clone(),
        store,
        source,
        models,
        Arc::new(SystemClock),
        metrics.clone(),
    ));
    let runtime = Arc::new(CycleRuntime::new(context));

    let health = Arc::new(RwLock::new(HealthStatus::default()));
    let scheduler = CycleScheduler::new(runtime, &config.cadence)?.with_health(health.clone());

    if config.http_port != 0 {
        let state = AppState::new(health, metrics.clone());
        let port = config.http_port;
        let shutdown = scheduler.shutdown_signal();
        tokio::spawn(async move {
            if let Err(e) = start_server(state, port, shutdown).await {
                error!(error = %e, "HTTP server error");
            }
        });
    }

    scheduler.start().await;

    info!("Worker started, waiting for shutdown signal...");
    shutdown_signal().await;

    info!("Shutting down worker, draining the current cycle...");
    scheduler.stop().await;
    info!("Worker stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
