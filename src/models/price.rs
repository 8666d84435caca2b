use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::{AlertError, Result};

static TICKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9]{2,10}$").expect("ticker regex"));

/// Market key shared by every notification quoting `symbol` in `quote`, e.g. `BTC-USDT`.
pub fn market_key(symbol: &str, quote: &str) -> String {
    format!("{}-{}", symbol.to_uppercase(), quote.to_uppercase())
}

/// Upper-cases and validates a crypto symbol or quote currency code.
pub fn normalize_ticker(field: &str, raw: &str) -> Result<String> {
    let t = raw.trim().to_uppercase();
    if !TICKER_RE.is_match(&t) {
        return Err(AlertError::InvalidRequest(format!(
            "{field} must be 2-10 letters or digits, got '{raw}'"
        )));
    }
    Ok(t)
}

/// Half-up rounding to cents, used for every stored boundary.
pub fn round2(v: Decimal) -> Decimal {
    v.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// One quote from the price feed. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSample {
    pub market: String,
    pub price: Decimal,
    pub timestamp: i64,
}

impl PriceSample {
    /// Rejects zero and negative prices so a bad quote never reaches the engine.
    pub fn new(market: &str, price: Decimal, timestamp: i64) -> Result<Self> {
        if price <= Decimal::ZERO {
            return Err(AlertError::invalid_sample(
                market,
                format!("price must be positive, got {price}"),
            ));
        }
        Ok(Self {
            market: market.to_string(),
            price,
            timestamp,
        })
    }
}
