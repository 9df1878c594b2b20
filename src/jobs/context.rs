//! Pipeline context for dependency injection

use std::sync::Arc;

use crate::config::Config;
use crate::core::clock::Clock;
use crate::db::TimeSeriesStore;
use crate::forecast::{ForecastRunner, ModelSource};
use crate::metrics::Metrics;
use crate::pipeline::{IncrementalFetcher, StoreWriter, WatermarkResolver};
use crate::services::market_data::MarketDataSource;
use crate::snapshot::SnapshotPublisher;

/// Everything one symbol pass needs, built once from the configuration.
///
/// The context owns its store handle and model repository; there is no
/// process-wide client or model cache.
pub struct PipelineContext {
    pub config: Arc<Config>,
    pub clock: Arc<dyn Clock>,
    pub store: Arc<dyn TimeSeriesStore>,
    pub watermarks: WatermarkResolver,
    pub fetcher: IncrementalFetcher,
    pub writer: StoreWriter,
    pub forecaster: ForecastRunner,
    pub publisher: SnapshotPublisher,
    pub metrics: Arc<Metrics>,
}

impl PipelineContext {
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn TimeSeriesStore>,
        source: Arc<dyn MarketDataSource>,
        models: Arc<dyn ModelSource>,
        clock: Arc<dyn Clock>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            watermarks: WatermarkResolver::new(store.clone(), config.lookback()),
            fetcher: IncrementalFetcher::new(source, config.timeframe.clone(), config.fetch_limit),
            writer: StoreWriter::new(store.clone()),
            forecaster: ForecastRunner::new(
                models,
                config.forecast_horizon,
                config.timeframe.duration(),
            ),
            publisher: SnapshotPublisher::new(config.snapshot_dir.clone(), config.snapshot_timeout),
            config,
            clock,
            store,
            metrics,
        }
    }
}
