//! One pipeline cycle over every configured symbol

use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::core::shutdown::Shutdown;
use crate::jobs::context::PipelineContext;
use crate::jobs::handlers;
use crate::jobs::types::{CycleReport, ForecastStatus, Stage, StageProgress, SymbolOutcome, SymbolReport};
use crate::models::Symbol;

/// Runs symbol pipelines as separate tasks, at most `concurrency` at once.
///
/// Symbols share nothing but the store handle and the snapshot directory,
/// and every snapshot file is symbol-qualified, so no locking is needed.
pub struct CycleRuntime {
    ctx: Arc<PipelineContext>,
    concurrency: usize,
}

impl CycleRuntime {
    /// Concurrency defaults to the configured worker count.
    pub fn new(ctx: Arc<PipelineContext>) -> Self {
        let concurrency = ctx.config.worker_concurrency.max(1);
        Self { ctx, concurrency }
    }

    /// Set custom concurrency (1 runs symbols one after another)
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn context(&self) -> &Arc<PipelineContext> {
        &self.ctx
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.ctx.config.symbols
    }

    /// Run every symbol once and wait for all of them.
    ///
    /// A failing or panicking symbol never affects the others. Reports come
    /// back in configured symbol order.
    pub async fn run_cycle(&self, shutdown: &Shutdown) -> CycleReport {
        let started_at = self.ctx.clock.now();
        let timer = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));

        info!(
            symbols = self.symbols().len(),
            concurrency = self.concurrency,
            "Cycle started"
        );

        let runs = self.symbols().iter().cloned().map(|symbol| {
            let ctx = self.ctx.clone();
            let semaphore = semaphore.clone();
            let shutdown = shutdown.clone();
            async move {
                let symbol_timer = Instant::now();
                let progress = StageProgress::default();
                let task = {
                    let symbol = symbol.clone();
                    let progress = progress.clone();
                    tokio::spawn(async move {
                        let Ok(_permit) = semaphore.acquire_owned().await else {
                            return SymbolOutcome::Cancelled {
                                stage: Stage::Watermark,
                            };
                        };
                        handlers::run_symbol(&ctx, &symbol, &shutdown, &progress).await
                    })
                };

                let outcome = match task.await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        error!(symbol = %symbol, error = %e, "Symbol task aborted");
                        SymbolOutcome::Failed {
                            stage: progress.current(),
                            transient: true,
                            reason: format!("symbol task aborted: {}", e),
                        }
                    }
                };

                SymbolReport {
                    symbol,
                    outcome,
                    elapsed: symbol_timer.elapsed(),
                }
            }
        });

        let reports = join_all(runs).await;
        for report in &reports {
            self.record(report);
        }

        let report = CycleReport {
            started_at,
            finished_at: self.ctx.clock.now(),
            reports,
        };

        let connected = self.ctx.store.is_connected().await;
        self.ctx
            .metrics
            .database_connected
            .set(if connected { 1.0 } else { 0.0 });

        let elapsed = timer.elapsed();
        self.ctx.metrics.cycles_total.inc();
        self.ctx
            .metrics
            .cycle_duration_seconds
            .observe(elapsed.as_secs_f64());

        info!(
            completed = report.completed(),
            failed = report.failed(),
            duration_ms = elapsed.as_millis() as u64,
            "Cycle finished"
        );
        report
    }

    /// One structured line and the counters for a symbol's pass.
    fn record(&self, report: &SymbolReport) {
        let metrics = &self.ctx.metrics;
        let symbol = &report.symbol;
        let elapsed_ms = report.elapsed.as_millis() as u64;

        metrics
            .symbol_runs_total
            .with_label_values(&[report.outcome.label()])
            .inc();

        match &report.outcome {
            SymbolOutcome::Completed {
                candles_written,
                forecast,
                watermark,
                history_published,
            } => {
                metrics.candles_written_total.inc_by(*candles_written as u64);
                let forecast_points = match forecast {
                    ForecastStatus::Published { points } => *points,
                    ForecastStatus::ModelMissing | ForecastStatus::Empty => 0,
                };
                metrics
                    .forecast_points_written_total
                    .inc_by(forecast_points as u64);

                if let Some(watermark) = watermark {
                    let lag = (self.ctx.clock.now() - *watermark).num_seconds().max(0);
                    metrics
                        .watermark_lag_seconds
                        .with_label_values(&[symbol.to_string().as_str()])
                        .set(lag as f64);
                }

                info!(
                    symbol = %symbol,
                    outcome = "completed",
                    candles = *candles_written,
                    forecast_points,
                    forecast = ?forecast,
                    watermark = ?watermark,
                    history_published = *history_published,
                    elapsed_ms,
                    "{} completed",
                    symbol
                );
            }
            SymbolOutcome::Failed {
                stage,
                transient,
                reason,
            } => {
                warn!(
                    symbol = %symbol,
                    outcome = "failed",
                    stage = %stage,
                    transient = *transient,
                    reason = %reason,
                    elapsed_ms,
                    "{} failed during {}",
                    symbol,
                    stage
                );
            }
            SymbolOutcome::Cancelled { stage } => {
                info!(
                    symbol = %symbol,
                    outcome = "cancelled",
                    stage = %stage,
                    elapsed_ms,
                    "{} cancelled before {}",
                    symbol,
                    stage
                );
            }
        }
    }
}
