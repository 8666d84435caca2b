//! Pure evaluation of a notification's condition against one market snapshot.

use rust_decimal::Decimal;

use crate::models::{
    ConditionKind, EmaCross, PercentBounds, RangeBounds, TriggerKind, price::round2,
};

#[derive(Debug, Clone, PartialEq)]
pub enum AlertCondition {
    Range(RangeBounds),
    Percent(PercentBounds),
    EmaCross(EmaCross),
}

/// Explicit per-evaluation settings, passed in rather than read from globals.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvaluationContext {
    /// Round the current price half-up to 2 dp before boundary comparison.
    /// Off by default: bounds are the only rounded quantities.
    pub round_price: bool,
}

/// Price and post-update EMA shared by every notification of a market in one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketSnapshot {
    pub price: Decimal,
    pub ema: Option<Decimal>,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub trigger: Option<TriggerKind>,
    pub next: AlertCondition,
}

impl Evaluation {
    pub fn triggered(&self) -> bool {
        self.trigger.is_some()
    }
}

impl AlertCondition {
    pub fn kind(&self) -> ConditionKind {
        match self {
            AlertCondition::Range(_) => ConditionKind::Range,
            AlertCondition::Percent(_) => ConditionKind::Percent,
            AlertCondition::EmaCross(_) => ConditionKind::EmaCross,
        }
    }

    /// `active` is the notification's lifecycle flag. A terminal kind that is no
    /// longer active never triggers again; EmaCross ignores it.
    pub fn evaluate(&self, active: bool, snap: MarketSnapshot, ctx: &EvaluationContext) -> Evaluation {
        let trigger = match self {
            AlertCondition::Range(r) => {
                boundary_hit(active, r.lower_boundary, r.upper_boundary, snap.price, ctx)
            }
            AlertCondition::Percent(p) => {
                boundary_hit(active, p.lower_boundary, p.upper_boundary, snap.price, ctx)
            }
            AlertCondition::EmaCross(state) => {
                return evaluate_cross(state, snap);
            }
        };

        Evaluation {
            trigger,
            next: self.clone(),
        }
    }
}

fn boundary_hit(
    active: bool,
    lower: Decimal,
    upper: Decimal,
    price: Decimal,
    ctx: &EvaluationContext,
) -> Option<TriggerKind> {
    if !active {
        return None;
    }

    let price = if ctx.round_price { round2(price) } else { price };

    if price >= upper {
        Some(TriggerKind::UpperBoundary)
    } else if price <= lower {
        Some(TriggerKind::LowerBoundary)
    } else {
        None
    }
}

fn evaluate_cross(state: &EmaCross, snap: MarketSnapshot) -> Evaluation {
    let unchanged = Evaluation {
        trigger: None,
        next: AlertCondition::EmaCross(state.clone()),
    };

    let Some(ema) = snap.ema else {
        return unchanged;
    };

    let now_above = ema > snap.price;
    if now_above == state.is_above {
        return unchanged;
    }

    let trigger = if now_above {
        TriggerKind::TrendDown
    } else {
        TriggerKind::TrendUp
    };

    Evaluation {
        trigger: Some(trigger),
        next: AlertCondition::EmaCross(EmaCross {
            start_ema: state.start_ema,
            current_ema: ema,
            is_above: now_above,
            updated_at: snap.timestamp,
        }),
    }
}
