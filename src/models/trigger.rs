use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    /// Price reached or crossed the upper boundary.
    UpperBoundary,
    /// Price reached or fell through the lower boundary.
    LowerBoundary,
    /// Price rose above the EMA.
    TrendUp,
    /// Price fell below the EMA.
    TrendDown,
}

/// Emitted exactly once per qualifying transition, after the write-back succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub notification_id: String,
    pub chat_id: String,
    pub market: String,
    pub kind: TriggerKind,
    pub price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ema: Option<Decimal>,
    pub timestamp: i64,
}

impl TriggerEvent {
    pub fn message(&self) -> String {
        let price = self.price.round_dp(2);
        match self.kind {
            TriggerKind::UpperBoundary => {
                format!("{} rose above the upper boundary, now {}", self.market, price)
            }
            TriggerKind::LowerBoundary => {
                format!("{} fell below the lower boundary, now {}", self.market, price)
            }
            TriggerKind::TrendUp => format!(
                "Upward trend for {}: price {} is above EMA {}",
                self.market,
                price,
                self.ema.unwrap_or_default().round_dp(2)
            ),
            TriggerKind::TrendDown => format!(
                "Downward trend for {}: price {} is below EMA {}",
                self.market,
                price,
                self.ema.unwrap_or_default().round_dp(2)
            ),
        }
    }
}
