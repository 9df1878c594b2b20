//! One symbol's pass: watermark, fetch, write, forecast, write, publish

use tracing::{debug, info, warn};

use crate::core::shutdown::Shutdown;
use crate::error::{PipelineError, SnapshotError};
use crate::forecast::ForecastOutcome;
use crate::jobs::context::PipelineContext;
use crate::jobs::types::{ForecastStatus, Stage, StageProgress, SymbolOutcome};
use crate::models::{merge_candles, Candle, Symbol};
use crate::snapshot::SnapshotKind;

/// Run every stage for `symbol` and fold the result into an outcome.
///
/// Never returns an error: failures are reported as [`SymbolOutcome::Failed`]
/// so the caller can move on to the next symbol.
pub async fn run_symbol(
    ctx: &PipelineContext,
    symbol: &Symbol,
    shutdown: &Shutdown,
    progress: &StageProgress,
) -> SymbolOutcome {
    match process_symbol(ctx, symbol, shutdown, progress).await {
        Ok(outcome) => outcome,
        Err(PipelineError::Cancelled(stage)) => SymbolOutcome::Cancelled { stage },
        Err(e) => SymbolOutcome::Failed {
            stage: e.stage(),
            transient: e.is_transient(),
            reason: e.to_string(),
        },
    }
}

fn checkpoint(shutdown: &Shutdown, progress: &StageProgress, stage: Stage) -> Result<(), PipelineError> {
    progress.enter(stage);
    if shutdown.is_triggered() {
        return Err(PipelineError::Cancelled(stage));
    }
    Ok(())
}

async fn process_symbol(
    ctx: &PipelineContext,
    symbol: &Symbol,
    shutdown: &Shutdown,
    progress: &StageProgress,
) -> Result<SymbolOutcome, PipelineError> {
    checkpoint(shutdown, progress, Stage::Watermark)?;
    let now = ctx.clock.now();
    let watermark = ctx.watermarks.resolve(symbol, now).await;
    let start = ctx.watermarks.fetch_start(watermark, now);

    checkpoint(shutdown, progress, Stage::Fetch)?;
    let fetched = ctx.fetcher.fetch(symbol, start).await?;

    checkpoint(shutdown, progress, Stage::WriteCandles)?;
    let candles_written = ctx
        .writer
        .write_candles(symbol, &fetched)
        .await
        .map_err(|e| PipelineError::store(Stage::WriteCandles, e))?;
    let watermark = watermark.max(fetched.last().map(|c| c.timestamp));

    checkpoint(shutdown, progress, Stage::Forecast)?;
    let generated_at = ctx.clock.now();
    let points = match ctx.forecaster.run(symbol, generated_at).await? {
        ForecastOutcome::ModelMissing => {
            ctx.metrics.models_missing_total.inc();
            info!(symbol = %symbol, "No model artifact for {}, skipping forecast", symbol);
            None
        }
        ForecastOutcome::Produced(points) => Some(points),
    };

    if let Some(points) = points.as_ref().filter(|p| !p.is_empty()) {
        checkpoint(shutdown, progress, Stage::WriteForecast)?;
        ctx.writer
            .write_forecast(symbol, points, generated_at)
            .await
            .map_err(|e| PipelineError::store(Stage::WriteForecast, e))?;
    }

    checkpoint(shutdown, progress, Stage::Publish)?;
    let published_at = ctx.clock.now();
    let history = history_window(ctx, symbol, &fetched, published_at).await?;

    let history_result = if history.is_empty() {
        debug!(symbol = %symbol, "No history in the lookback window, keeping the previous snapshot");
        Ok(false)
    } else {
        let result = ctx.publisher.publish_history(symbol, history, published_at).await;
        record_snapshot(ctx, SnapshotKind::History, &result);
        result.map(|_| true)
    };

    let forecast_result = match points {
        None => clear_forecast(ctx, symbol, published_at)
            .await
            .map(|_| ForecastStatus::ModelMissing),
        Some(points) if points.is_empty() => clear_forecast(ctx, symbol, published_at)
            .await
            .map(|_| ForecastStatus::Empty),
        Some(points) => {
            let count = points.len();
            let result = ctx.publisher.publish_forecast(symbol, points, published_at).await;
            record_snapshot(ctx, SnapshotKind::Prediction, &result);
            result.map(|_| ForecastStatus::Published { points: count })
        }
    };

    let history_published = history_result?;
    Ok(SymbolOutcome::Completed {
        candles_written,
        forecast: forecast_result?,
        watermark,
        history_published,
    })
}

/// Replace a prediction snapshot left by an earlier pass with an empty one,
/// so readers never see a forecast the current model did not produce.
async fn clear_forecast(
    ctx: &PipelineContext,
    symbol: &Symbol,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<(), SnapshotError> {
    let path = ctx.publisher.forecast_path(symbol);
    if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
        return Ok(());
    }
    warn!(symbol = %symbol, path = %path.display(), "No forecast this pass, clearing the previous prediction snapshot");
    let result = ctx.publisher.publish_forecast(symbol, Vec::new(), now).await;
    record_snapshot(ctx, SnapshotKind::Prediction, &result);
    result.map(|_| ())
}

/// Stored candles inside the lookback window, with this pass's fetch laid
/// over them. QuestDB applies WAL writes asynchronously, so a read straight
/// after the write may not see the newest rows yet.
async fn history_window(
    ctx: &PipelineContext,
    symbol: &Symbol,
    fetched: &[Candle],
    now: chrono::DateTime<chrono::Utc>,
) -> Result<Vec<Candle>, PipelineError> {
    let window_start = ctx.watermarks.window_start(now);
    let stored = ctx
        .store
        .query_candles(symbol, window_start, now)
        .await
        .map_err(|e| PipelineError::store(Stage::Publish, e))?;

    let recent: Vec<Candle> = fetched
        .iter()
        .filter(|c| c.timestamp >= window_start)
        .copied()
        .collect();
    Ok(merge_candles(stored, &recent))
}

fn record_snapshot<T>(ctx: &PipelineContext, kind: SnapshotKind, result: &Result<T, SnapshotError>) {
    let label = if result.is_ok() { "ok" } else { "error" };
    ctx.metrics
        .snapshot_writes_total
        .with_label_values(&[kind.as_str(), label])
        .inc();
}
