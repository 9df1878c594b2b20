//! Worker configuration, read once from the environment at startup.
//!
//! Nothing below the binary entry point reads environment variables; the
//! resulting [`Config`] is shared by `Arc` with every component.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::models::{Symbol, Timeframe};

pub const DEFAULT_SYMBOLS: [&str; 5] = ["BTC/USDT", "ETH/USDT", "XRP/USDT", "SOL/USDT", "DOGE/USDT"];
pub const DEFAULT_MARKET_DATA_URL: &str = "https://api.binance.com";
/// Largest page the kline endpoint serves.
pub const MAX_FETCH_LIMIT: usize = 1000;
pub const MAX_FORECAST_HORIZON: usize = 10_000;
pub const MAX_LOOKBACK_DAYS: u32 = 3650;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Production,
    Sandbox,
}

impl Environment {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            _ => Environment::Sandbox,
        }
    }

    /// Reads `APP_ENV`; anything other than `production`/`prod` is sandbox.
    pub fn from_env() -> Self {
        std::env::var("APP_ENV")
            .map(|v| Self::parse(&v))
            .unwrap_or(Environment::Sandbox)
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Production => f.write_str("production"),
            Environment::Sandbox => f.write_str("sandbox"),
        }
    }
}

/// How cycles are spaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cadence {
    /// Sleep this long after each cycle finishes.
    Interval(Duration),
    /// Six-field cron expression (seconds first), validated at load time.
    Cron(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    QuestDb { url: String },
    /// Process-local store; nothing survives a restart.
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub store: StoreBackend,
    pub market_data_url: String,
    pub symbols: Vec<Symbol>,
    pub timeframe: Timeframe,
    pub lookback_days: u32,
    pub fetch_limit: usize,
    pub forecast_horizon: usize,
    pub cadence: Cadence,
    pub worker_concurrency: usize,
    pub snapshot_dir: PathBuf,
    pub models_dir: PathBuf,
    pub source_timeout: Duration,
    pub store_timeout: Duration,
    pub snapshot_timeout: Duration,
    pub http_port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let environment = get("APP_ENV")
            .map(|v| Environment::parse(&v))
            .unwrap_or(Environment::Sandbox);

        let store = parse_store_url(get("QUESTDB_URL").ok_or(ConfigError::Missing("QUESTDB_URL"))?)?;

        let market_data_url = get("MARKET_DATA_URL").unwrap_or_else(|| DEFAULT_MARKET_DATA_URL.to_string());
        url::Url::parse(&market_data_url).map_err(|e| ConfigError::Invalid {
            key: "MARKET_DATA_URL",
            reason: e.to_string(),
        })?;

        let symbols = match get("SYMBOLS") {
            Some(list) => parse_symbols(&list)?,
            None => parse_symbols(&DEFAULT_SYMBOLS.join(","))?,
        };

        let timeframe = match get("TIMEFRAME") {
            Some(tf) => tf.parse::<Timeframe>().map_err(|e| ConfigError::Invalid {
                key: "TIMEFRAME",
                reason: e.to_string(),
            })?,
            None => Timeframe::hourly(),
        };

        let lookback_days: u32 = parse_or(&get, "LOOKBACK_DAYS", 30)?;
        if lookback_days == 0 || lookback_days > MAX_LOOKBACK_DAYS {
            return Err(invalid("LOOKBACK_DAYS", "must be between 1 and 3650"));
        }

        let fetch_limit: usize = parse_or(&get, "FETCH_LIMIT", MAX_FETCH_LIMIT)?;
        if fetch_limit == 0 || fetch_limit > MAX_FETCH_LIMIT {
            return Err(invalid("FETCH_LIMIT", "must be between 1 and 1000"));
        }

        let forecast_horizon: usize = parse_or(&get, "FORECAST_HORIZON", 24)?;
        if forecast_horizon == 0 || forecast_horizon > MAX_FORECAST_HORIZON {
            return Err(invalid("FORECAST_HORIZON", "must be between 1 and 10000"));
        }

        let cadence = match get("CYCLE_CRON") {
            Some(expr) => {
                cron::Schedule::from_str(&expr).map_err(|e| ConfigError::Invalid {
                    key: "CYCLE_CRON",
                    reason: e.to_string(),
                })?;
                Cadence::Cron(expr)
            }
            None => {
                let secs: u64 = parse_or(&get, "CYCLE_INTERVAL_SECONDS", 60)?;
                if secs == 0 {
                    return Err(invalid("CYCLE_INTERVAL_SECONDS", "must be greater than 0"));
                }
                Cadence::Interval(Duration::from_secs(secs))
            }
        };

        let worker_concurrency: usize = parse_or(&get, "WORKER_CONCURRENCY", symbols.len())?;
        if worker_concurrency == 0 {
            return Err(invalid("WORKER_CONCURRENCY", "must be at least 1"));
        }

        let source_timeout = Duration::from_secs(positive_secs(&get, "SOURCE_TIMEOUT_SECONDS", 10)?);
        let store_timeout = Duration::from_secs(positive_secs(&get, "STORE_TIMEOUT_SECONDS", 10)?);
        let snapshot_timeout = Duration::from_secs(positive_secs(&get, "SNAPSHOT_TIMEOUT_SECONDS", 5)?);

        Ok(Self {
            environment,
            store,
            market_data_url,
            symbols,
            timeframe,
            lookback_days,
            fetch_limit,
            forecast_horizon,
            cadence,
            worker_concurrency,
            snapshot_dir: PathBuf::from(get("SNAPSHOT_DIR").unwrap_or_else(|| "static".to_string())),
            models_dir: PathBuf::from(get("MODELS_DIR").unwrap_or_else(|| "models".to_string())),
            source_timeout,
            store_timeout,
            snapshot_timeout,
            http_port: parse_or(&get, "HTTP_PORT", 9090)?,
        })
    }

    pub fn lookback(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.lookback_days))
    }
}

fn invalid(key: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        reason: reason.to_string(),
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn positive_secs<G>(get: &G, key: &'static str, default: u64) -> Result<u64, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let secs: u64 = parse_or(get, key, default)?;
    if secs == 0 {
        return Err(invalid(key, "must be greater than 0"));
    }
    Ok(secs)
}

/// Ordered, de-duplicated symbol list. Empty lists are rejected.
pub fn parse_symbols(list: &str) -> Result<Vec<Symbol>, ConfigError> {
    let mut symbols: Vec<Symbol> = Vec::new();
    for raw in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let symbol: Symbol = raw.parse().map_err(|e: crate::models::ParseSymbolError| {
            ConfigError::Invalid {
                key: "SYMBOLS",
                reason: e.to_string(),
            }
        })?;
        if !symbols.contains(&symbol) {
            symbols.push(symbol);
        }
    }
    if symbols.is_empty() {
        return Err(invalid("SYMBOLS", "at least one symbol is required"));
    }
    Ok(symbols)
}

fn parse_store_url(raw: String) -> Result<StoreBackend, ConfigError> {
    if raw == "memory://" {
        return Ok(StoreBackend::Memory);
    }
    let parsed = url::Url::parse(&raw).map_err(|e| ConfigError::Invalid {
        key: "QUESTDB_URL",
        reason: e.to_string(),
    })?;
    if !matches!(parsed.scheme(), "postgres" | "postgresql") {
        return Err(invalid("QUESTDB_URL", "scheme must be postgres:// or postgresql://"));
    }
    if parsed.username().is_empty() {
        return Err(invalid("QUESTDB_URL", "credentials are required (user name missing)"));
    }
    if parsed.host_str().is_none() {
        return Err(invalid("QUESTDB_URL", "host is required"));
    }
    Ok(StoreBackend::QuestDb { url: raw })
}
