use std::collections::HashMap;

use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::error::{AlertError, Result};

/// k = 2/(39+1) = 0.05, the smoothing the bot has always used.
pub const DEFAULT_EMA_PERIOD: u32 = 39;

pub const MAX_EMA_PERIOD: u32 = 10_000;

#[derive(Debug, Clone, Copy)]
struct EmaState {
    value: Decimal,
    updated_at: i64,
}

/// One exponential moving average per market.
///
/// State lives behind a single lock so updates for a market are applied in
/// call order; the lock is never held across an await.
pub struct EmaTracker {
    period: u32,
    k: Decimal,
    series: Mutex<HashMap<String, EmaState>>,
}

impl EmaTracker {
    pub fn new(period: u32) -> Self {
        let period = period.max(1);
        let k = Decimal::TWO / (Decimal::from(period) + Decimal::ONE);

        Self {
            period,
            k,
            series: Mutex::new(HashMap::new()),
        }
    }

    pub fn period(&self) -> u32 {
        self.period
    }

    pub fn smoothing(&self) -> Decimal {
        self.k
    }

    /// Feeds one sample and returns the updated EMA.
    ///
    /// The first sample for a market seeds the EMA with the price. Non-positive
    /// prices and samples older than the last update are rejected untouched.
    pub fn update(&self, market: &str, price: Decimal, timestamp: i64) -> Result<Decimal> {
        if price <= Decimal::ZERO {
            return Err(AlertError::invalid_sample(
                market,
                format!("price must be positive, got {price}"),
            ));
        }

        let mut series = self.series.lock();

        let next = match series.get(market) {
            None => price,
            Some(prev) if timestamp < prev.updated_at => {
                return Err(AlertError::invalid_sample(
                    market,
                    format!(
                        "sample at {timestamp} is older than last update at {}",
                        prev.updated_at
                    ),
                ));
            }
            Some(prev) => price * self.k + prev.value * (Decimal::ONE - self.k),
        };

        series.insert(
            market.to_string(),
            EmaState {
                value: next,
                updated_at: timestamp,
            },
        );

        Ok(next)
    }

    /// Seeds a market from a previously persisted EMA. No-op if the market is
    /// already tracked; returns whether the value was taken. The restored value
    /// does not constrain the ordering of the next live sample.
    pub fn restore(&self, market: &str, ema: Decimal) -> bool {
        if ema <= Decimal::ZERO {
            return false;
        }

        let mut series = self.series.lock();
        if series.contains_key(market) {
            return false;
        }

        series.insert(
            market.to_string(),
            EmaState {
                value: ema,
                updated_at: i64::MIN,
            },
        );
        true
    }

    pub fn current(&self, market: &str) -> Option<Decimal> {
        self.series.lock().get(market).map(|s| s.value)
    }

    pub fn is_tracking(&self, market: &str) -> bool {
        self.series.lock().contains_key(market)
    }
}

impl Default for EmaTracker {
    fn default() -> Self {
        Self::new(DEFAULT_EMA_PERIOD)
    }
}
