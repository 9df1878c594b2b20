use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const MAX_ASSET_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid symbol '{input}': {reason}")]
pub struct ParseSymbolError {
    pub input: String,
    pub reason: &'static str,
}

/// A tradable pair written as `BASE/QUOTE`, e.g. `BTC/USDT`.
///
/// Both legs are restricted to upper-case ASCII letters and digits, so a
/// symbol can be used as a file-name fragment or a store tag as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol {
    base: String,
    quote: String,
}

impl Symbol {
    pub fn new(base: &str, quote: &str) -> Result<Self, ParseSymbolError> {
        format!("{}/{}", base, quote).parse()
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn quote(&self) -> &str {
        &self.quote
    }

    /// `BTC_USDT`, used for snapshot and model artifact file names.
    pub fn file_stem(&self) -> String {
        format!("{}_{}", self.base, self.quote)
    }

    /// `BTCUSDT`, the concatenated form exchanges use on their REST APIs.
    pub fn exchange_pair(&self) -> String {
        format!("{}{}", self.base, self.quote)
    }
}

fn validate_leg(input: &str, leg: &str) -> Result<(), ParseSymbolError> {
    let invalid = |reason| ParseSymbolError {
        input: input.to_string(),
        reason,
    };
    if leg.is_empty() {
        return Err(invalid("empty asset"));
    }
    if leg.len() > MAX_ASSET_LEN {
        return Err(invalid("asset name too long"));
    }
    if !leg
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
    {
        return Err(invalid("assets must be upper-case letters or digits"));
    }
    Ok(())
}

impl FromStr for Symbol {
    type Err = ParseSymbolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (base, quote) = trimmed.split_once('/').ok_or_else(|| ParseSymbolError {
            input: s.to_string(),
            reason: "expected BASE/QUOTE",
        })?;
        validate_leg(s, base)?;
        validate_leg(s, quote)?;
        Ok(Self {
            base: base.to_string(),
            quote: quote.to_string(),
        })
    }
}

impl TryFrom<String> for Symbol {
    type Error = ParseSymbolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.to_string()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}
