//! Shared data models spanning the pipeline stages.

pub mod candle;
pub mod forecast;
pub mod snapshot;
pub mod symbol;
pub mod timeframe;

pub use candle::{merge_candles, Candle};
pub use forecast::ForecastPoint;
pub use snapshot::{ForecastSnapshot, HistorySnapshot};
pub use symbol::{ParseSymbolError, Symbol};
pub use timeframe::{align_down, ParseTimeframeError, Timeframe};
