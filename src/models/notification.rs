use mongodb::bson::oid::ObjectId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{AlertError, Result};
use crate::models::price::{market_key, round2};
use crate::services::alert_condition::AlertCondition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionKind {
    Range,
    Percent,
    EmaCross,
}

impl ConditionKind {
    /// Range and Percent notifications stop evaluating after their first trigger.
    /// EmaCross notifications keep firing on every direction flip.
    pub fn is_terminal(self) -> bool {
        !matches!(self, ConditionKind::EmaCross)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConditionKind::Range => "range",
            ConditionKind::Percent => "percent",
            ConditionKind::EmaCross => "ema_cross",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeBounds {
    pub lower_boundary: Decimal,
    pub upper_boundary: Decimal,
}

impl RangeBounds {
    pub fn new(lower: Decimal, upper: Decimal) -> Self {
        Self {
            lower_boundary: round2(lower),
            upper_boundary: round2(upper),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PercentBounds {
    pub start_price: Decimal,
    pub down_percent: Decimal,
    pub up_percent: Decimal,
    pub lower_boundary: Decimal,
    pub upper_boundary: Decimal,
}

impl PercentBounds {
    /// Resolves the absolute bounds once; evaluation never recomputes them.
    /// Fails with `InvalidRequest` when the bounds do not fit a `Decimal`.
    pub fn derive(start_price: Decimal, down_percent: Decimal, up_percent: Decimal) -> Result<Self> {
        let scale = |pct: Decimal, up: bool| {
            let frac = pct.checked_div(Decimal::ONE_HUNDRED)?;
            let factor = if up {
                Decimal::ONE.checked_add(frac)?
            } else {
                Decimal::ONE.checked_sub(frac)?
            };
            start_price.checked_mul(factor)
        };

        let out_of_range = || {
            AlertError::InvalidRequest(format!(
                "percent bounds out of range for start price {start_price}"
            ))
        };
        let lower = scale(down_percent, false).ok_or_else(out_of_range)?;
        let upper = scale(up_percent, true).ok_or_else(out_of_range)?;

        Ok(Self {
            start_price,
            down_percent,
            up_percent,
            lower_boundary: round2(lower),
            upper_boundary: round2(upper),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmaCross {
    pub start_ema: Decimal,
    pub current_ema: Decimal,
    // true while EMA > price
    pub is_above: bool,
    // unix seconds of the last persisted current_ema
    pub updated_at: i64,
}

/// A user-defined alert as stored in the `notifications` collection.
///
/// Exactly one of `range`, `percent`, `ema_cross` is populated and it must
/// agree with `kind`; [`Notification::condition`] enforces that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    pub chat_id: String,
    pub symbol: String,
    pub quote: String,

    pub kind: ConditionKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<RangeBounds>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent: Option<PercentBounds>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ema_cross: Option<EmaCross>,

    pub is_active: bool,
    pub created_at: i64,
    #[serde(default)]
    pub triggered_at: Option<i64>,
}

impl Notification {
    fn blank(chat_id: &str, symbol: &str, quote: &str, kind: ConditionKind, now: i64) -> Self {
        Self {
            id: ObjectId::new(),
            chat_id: chat_id.to_string(),
            symbol: symbol.to_uppercase(),
            quote: quote.to_uppercase(),
            kind,
            range: None,
            percent: None,
            ema_cross: None,
            is_active: true,
            created_at: now,
            triggered_at: None,
        }
    }

    pub fn range(chat_id: &str, symbol: &str, quote: &str, bounds: RangeBounds, now: i64) -> Self {
        let mut n = Self::blank(chat_id, symbol, quote, ConditionKind::Range, now);
        n.range = Some(bounds);
        n
    }

    pub fn percent(
        chat_id: &str,
        symbol: &str,
        quote: &str,
        bounds: PercentBounds,
        now: i64,
    ) -> Self {
        let mut n = Self::blank(chat_id, symbol, quote, ConditionKind::Percent, now);
        n.percent = Some(bounds);
        n
    }

    /// Starts an EMA trend watch. `is_above` reflects the EMA/price relation at creation.
    pub fn ema_cross(
        chat_id: &str,
        symbol: &str,
        quote: &str,
        start_ema: Decimal,
        price: Decimal,
        now: i64,
    ) -> Self {
        let mut n = Self::blank(chat_id, symbol, quote, ConditionKind::EmaCross, now);
        n.ema_cross = Some(EmaCross {
            start_ema,
            current_ema: start_ema,
            is_above: start_ema > price,
            updated_at: now,
        });
        n
    }

    pub fn market(&self) -> String {
        market_key(&self.symbol, &self.quote)
    }

    /// Resolves the stored payloads into the closed condition variant.
    pub fn condition(&self) -> Result<AlertCondition> {
        let populated = [
            self.range.is_some(),
            self.percent.is_some(),
            self.ema_cross.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count();

        if populated != 1 {
            return Err(AlertError::malformed(
                self.id.to_hex(),
                format!("expected exactly one condition payload, found {populated}"),
            ));
        }

        match (self.kind, &self.range, &self.percent, &self.ema_cross) {
            (ConditionKind::Range, Some(r), _, _) => Ok(AlertCondition::Range(r.clone())),
            (ConditionKind::Percent, _, Some(p), _) => Ok(AlertCondition::Percent(p.clone())),
            (ConditionKind::EmaCross, _, _, Some(e)) => Ok(AlertCondition::EmaCross(e.clone())),
            (kind, ..) => Err(AlertError::malformed(
                self.id.to_hex(),
                format!("payload does not match kind '{}'", kind.as_str()),
            )),
        }
    }

    /// EmaCross notifications are permanently active regardless of the stored flag.
    pub fn is_live(&self) -> bool {
        if self.kind.is_terminal() {
            self.is_active && self.triggered_at.is_none()
        } else {
            true
        }
    }
}
