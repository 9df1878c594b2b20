//! Prometheus metrics for the worker and its health endpoint

use prometheus::{
    Encoder, Gauge, GaugeVec, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge,
    Opts, Registry, TextEncoder,
};

pub struct Metrics {
    registry: Registry,

    pub http_requests_total: IntCounter,
    pub http_requests_in_flight: IntGauge,
    pub http_request_duration_seconds: Histogram,

    pub cycles_total: IntCounter,
    pub cycle_duration_seconds: Histogram,
    /// Labelled by `outcome`: completed, failed, cancelled.
    pub symbol_runs_total: IntCounterVec,
    pub candles_written_total: IntCounter,
    pub forecast_points_written_total: IntCounter,
    /// Labelled by `kind` (history, prediction) and `result` (ok, error).
    pub snapshot_writes_total: IntCounterVec,
    pub models_missing_total: IntCounter,
    pub watermark_lag_seconds: GaugeVec,
    pub database_connected: Gauge,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let http_requests_total =
            IntCounter::new("http_requests_total", "Total HTTP requests served")?;
        let http_requests_in_flight =
            IntGauge::new("http_requests_in_flight", "HTTP requests currently being served")?;
        let http_request_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request latency",
        ))?;

        let cycles_total = IntCounter::new("pipeline_cycles_total", "Completed pipeline cycles")?;
        let cycle_duration_seconds = Histogram::with_opts(
            HistogramOpts::new("pipeline_cycle_duration_seconds", "Wall time of one cycle")
                .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]),
        )?;
        let symbol_runs_total = IntCounterVec::new(
            Opts::new("pipeline_symbol_runs_total", "Per-symbol pipeline passes by outcome"),
            &["outcome"],
        )?;
        let candles_written_total =
            IntCounter::new("pipeline_candles_written_total", "Candles upserted into the store")?;
        let forecast_points_written_total = IntCounter::new(
            "pipeline_forecast_points_written_total",
            "Forecast points upserted into the store",
        )?;
        let snapshot_writes_total = IntCounterVec::new(
            Opts::new("pipeline_snapshot_writes_total", "Snapshot file replacements"),
            &["kind", "result"],
        )?;
        let models_missing_total = IntCounter::new(
            "pipeline_models_missing_total",
            "Forecast steps skipped because no model artifact exists",
        )?;
        let watermark_lag_seconds = GaugeVec::new(
            Opts::new(
                "pipeline_watermark_lag_seconds",
                "Seconds between now and the newest persisted candle",
            ),
            &["symbol"],
        )?;
        let database_connected =
            Gauge::new("database_connected", "1 while the store connection is usable, checked at startup and after each cycle")?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_requests_in_flight.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;
        registry.register(Box::new(cycles_total.clone()))?;
        registry.register(Box::new(cycle_duration_seconds.clone()))?;
        registry.register(Box::new(symbol_runs_total.clone()))?;
        registry.register(Box::new(candles_written_total.clone()))?;
        registry.register(Box::new(forecast_points_written_total.clone()))?;
        registry.register(Box::new(snapshot_writes_total.clone()))?;
        registry.register(Box::new(models_missing_total.clone()))?;
        registry.register(Box::new(watermark_lag_seconds.clone()))?;
        registry.register(Box::new(database_connected.clone()))?;

        Ok(Self {
            registry,
            http_requests_total,
            http_requests_in_flight,
            http_request_duration_seconds,
            cycles_total,
            cycle_duration_seconds,
            symbol_runs_total,
            candles_written_total,
            forecast_points_written_total,
            snapshot_writes_total,
            models_missing_total,
            watermark_lag_seconds,
            database_connected,
        })
    }

    /// Render every registered metric in the Prometheus text format
    pub fn export(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
