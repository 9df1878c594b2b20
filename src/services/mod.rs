//! External market data services

pub mod binance;
pub mod market_data;

pub use binance::BinanceMarketData;
pub use market_data::{normalize_candles, MarketDataSource};
