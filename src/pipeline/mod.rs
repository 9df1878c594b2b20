//! Ingestion stages: watermark, fetch, write

pub mod fetcher;
pub mod watermark;
pub mod writer;

pub use fetcher::IncrementalFetcher;
pub use watermark::WatermarkResolver;
pub use writer::StoreWriter;
