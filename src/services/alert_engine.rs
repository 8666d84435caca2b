//! One evaluation pass over every active notification.
//!
//! Markets are independent price series and are processed concurrently. Inside
//! a market the price is fetched once and the EMA is advanced once before any
//! notification is evaluated, so every notification of that market sees the
//! same snapshot.

use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;

use futures_util::future::join_all;
use serde::{Serialize, Serializer};

use crate::error::AlertError;
use crate::models::{ConditionKind, Notification, TriggerEvent};
use crate::services::alert_condition::{AlertCondition, EvaluationContext, MarketSnapshot};
use crate::services::dispatcher::Dispatcher;
use crate::services::ema_tracker::EmaTracker;
use crate::services::notification_store::{NotificationStore, StateChange};
use crate::services::price_feed::PriceFeed;

#[derive(Debug, Default, Serialize)]
pub struct TickReport {
    pub now: i64,
    pub markets: usize,
    pub evaluated: usize,
    pub triggered: usize,
    /// Write-back or dispatch failures.
    pub failed: usize,
    /// Not evaluated this tick because their market had no usable price or EMA.
    pub skipped: usize,
    pub malformed: usize,
    pub failures: Vec<TickFailure>,
}

impl TickReport {
    fn absorb(&mut self, other: TickReport) {
        self.evaluated += other.evaluated;
        self.triggered += other.triggered;
        self.failed += other.failed;
        self.skipped += other.skipped;
        self.malformed += other.malformed;
        self.failures.extend(other.failures);
    }
}

#[derive(Debug, Serialize)]
pub struct TickFailure {
    pub market: Option<String>,
    pub notification_id: Option<String>,
    #[serde(serialize_with = "as_display")]
    pub error: AlertError,
}

fn as_display<S: Serializer>(v: &impl Display, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(v)
}

enum Outcome {
    Quiet,
    Triggered {
        id: String,
        dispatch_error: Option<AlertError>,
    },
    Failed {
        id: String,
        error: AlertError,
    },
}

pub struct AlertEngine {
    store: Arc<dyn NotificationStore>,
    feed: Arc<dyn PriceFeed>,
    dispatcher: Arc<dyn Dispatcher>,
    ema: Arc<EmaTracker>,
    ctx: EvaluationContext,
}

impl AlertEngine {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        feed: Arc<dyn PriceFeed>,
        dispatcher: Arc<dyn Dispatcher>,
        ema: Arc<EmaTracker>,
        ctx: EvaluationContext,
    ) -> Self {
        Self {
            store,
            feed,
            dispatcher,
            ema,
            ctx,
        }
    }

    pub fn ema_tracker(&self) -> &EmaTracker {
        &self.ema
    }

    pub async fn run_tick(&self, now: i64) -> TickReport {
        let mut report = TickReport {
            now,
            ..TickReport::default()
        };

        let active = match self.store.load_active().await {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(error = %e, "failed to load active notifications");
                report.failures.push(TickFailure {
                    market: None,
                    notification_id: None,
                    error: e,
                });
                return report;
            }
        };

        let mut by_market: HashMap<String, Vec<Notification>> = HashMap::new();
        for n in active.into_iter().filter(Notification::is_live) {
            by_market.entry(n.market()).or_default().push(n);
        }

        report.markets = by_market.len();

        let jobs = by_market
            .into_iter()
            .map(|(market, group)| self.run_market(market, group, now));

        for r in join_all(jobs).await {
            report.absorb(r);
        }

        tracing::info!(
            markets = report.markets,
            evaluated = report.evaluated,
            triggered = report.triggered,
            failed = report.failed,
            skipped = report.skipped,
            malformed = report.malformed,
            "alert tick finished"
        );

        report
    }

    async fn run_market(&self, market: String, group: Vec<Notification>, now: i64) -> TickReport {
        let mut report = TickReport::default();

        let mut resolved = Vec::with_capacity(group.len());
        for n in group {
            match n.condition() {
                Ok(c) => resolved.push((n, c)),
                Err(e) => {
                    tracing::error!(
                        market = %market,
                        notification_id = %n.id.to_hex(),
                        error = %e,
                        "malformed notification skipped, needs operator attention"
                    );
                    report.malformed += 1;
                    report.failures.push(TickFailure {
                        market: Some(market.clone()),
                        notification_id: Some(n.id.to_hex()),
                        error: e,
                    });
                }
            }
        }

        if resolved.is_empty() {
            return report;
        }

        let sample = match self.feed.get_price(&market).await {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(market = %market, error = %e, "price unavailable, market skipped this tick");
                report.skipped += resolved.len();
                report.failures.push(TickFailure {
                    market: Some(market),
                    notification_id: None,
                    error: e,
                });
                return report;
            }
        };

        let needs_ema = resolved
            .iter()
            .any(|(_, c)| c.kind() == ConditionKind::EmaCross);

        // single writer: the EMA is advanced before any reader evaluates
        let ema = if needs_ema {
            self.restore_ema(&market, &resolved);
            match self.ema.update(&market, sample.price, sample.timestamp) {
                Ok(v) => Some(v),
                Err(e) => {
                    tracing::warn!(market = %market, error = %e, "EMA not updated, trend alerts skipped");
                    let before = resolved.len();
                    resolved.retain(|(_, c)| c.kind() != ConditionKind::EmaCross);
                    report.skipped += before - resolved.len();
                    report.failures.push(TickFailure {
                        market: Some(market.clone()),
                        notification_id: None,
                        error: e,
                    });
                    None
                }
            }
        } else {
            None
        };

        let snap = MarketSnapshot {
            price: sample.price,
            ema,
            timestamp: sample.timestamp,
        };

        tracing::debug!(market = %market, price = %snap.price, ema = ?snap.ema, "evaluating market");

        let jobs = resolved
            .into_iter()
            .map(|(n, c)| self.apply(&market, n, c, snap, now));

        for outcome in join_all(jobs).await {
            report.evaluated += 1;
            match outcome {
                Outcome::Quiet => {}
                Outcome::Triggered { id, dispatch_error } => {
                    report.triggered += 1;
                    if let Some(error) = dispatch_error {
                        report.failed += 1;
                        report.failures.push(TickFailure {
                            market: Some(market.clone()),
                            notification_id: Some(id),
                            error,
                        });
                    }
                }
                Outcome::Failed { id, error } => {
                    report.failed += 1;
                    report.failures.push(TickFailure {
                        market: Some(market.clone()),
                        notification_id: Some(id),
                        error,
                    });
                }
            }
        }

        report
    }

    /// Evaluate, write back, then emit. Nothing is emitted unless the
    /// write-back landed, so a transition is announced at most once.
    async fn apply(
        &self,
        market: &str,
        n: Notification,
        condition: AlertCondition,
        snap: MarketSnapshot,
        now: i64,
    ) -> Outcome {
        let eval = condition.evaluate(n.is_active, snap, &self.ctx);
        let Some(kind) = eval.trigger else {
            return Outcome::Quiet;
        };

        let change = match (&condition, &eval.next) {
            (AlertCondition::EmaCross(prev), AlertCondition::EmaCross(next)) => StateChange::Flipped {
                was_above: prev.is_above,
                is_above: next.is_above,
                current_ema: next.current_ema,
                triggered_at: now,
            },
            _ => StateChange::Triggered { triggered_at: now },
        };

        let id = n.id.to_hex();

        if let Err(e) = self.store.save(&n.id, &change).await {
            tracing::warn!(market, notification_id = %id, error = %e, "write-back failed, retrying next tick");
            return Outcome::Failed { id, error: e };
        }

        let event = TriggerEvent {
            notification_id: id.clone(),
            chat_id: n.chat_id.clone(),
            market: market.to_string(),
            kind,
            price: snap.price,
            ema: snap.ema.filter(|_| condition.kind() == ConditionKind::EmaCross),
            timestamp: now,
        };

        let dispatch_error = match self.dispatcher.emit(&event).await {
            Ok(()) => None,
            Err(e) => {
                tracing::error!(market, notification_id = %id, error = %e, "trigger dispatch failed");
                Some(e)
            }
        };

        Outcome::Triggered { id, dispatch_error }
    }

    fn restore_ema(&self, market: &str, resolved: &[(Notification, AlertCondition)]) {
        if self.ema.is_tracking(market) {
            return;
        }

        let latest = resolved
            .iter()
            .filter_map(|(_, c)| match c {
                AlertCondition::EmaCross(e) => Some(e),
                _ => None,
            })
            .max_by_key(|e| e.updated_at);

        if let Some(e) = latest {
            if self.ema.restore(market, e.current_ema) {
                tracing::debug!(market, ema = %e.current_ema, "EMA restored from stored notification");
            }
        }
    }
}
