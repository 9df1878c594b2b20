//! Candlecast: incremental OHLCV ingestion and per-symbol forecasting.
//!
//! Each cycle resolves a watermark per symbol from the store, fetches only
//! newer candles, upserts them, runs the symbol's pre-trained model and
//! republishes history and forecast snapshots atomically.

pub mod config;
pub mod core;
pub mod db;
pub mod error;
pub mod forecast;
pub mod jobs;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod snapshot;
