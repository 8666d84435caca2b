//! Library entrypoint for CryptoAlerts.
//!
//! The binary wires real collaborators (MongoDB, BingX); integration tests
//! under `tests/` build the same [`AppState`] over in-memory ones.

use std::sync::Arc;

pub mod config;
pub mod error;
pub mod models;

pub mod services;

pub mod controllers;
pub mod routes;

use services::alert_condition::EvaluationContext;
use services::alert_engine::AlertEngine;
use services::dispatcher::{BroadcastDispatcher, Dispatcher};
use services::ema_tracker::EmaTracker;
use services::notification_store::NotificationStore;
use services::price_feed::PriceFeed;

#[derive(Clone)]
pub struct AppState {
    pub settings: config::Settings,
    pub store: Arc<dyn NotificationStore>,
    pub feed: Arc<dyn PriceFeed>,
    pub engine: Arc<AlertEngine>,
    pub events: BroadcastDispatcher,
}

impl AppState {
    pub fn new(
        settings: config::Settings,
        store: Arc<dyn NotificationStore>,
        feed: Arc<dyn PriceFeed>,
    ) -> Self {
        let (events_tx, _events_rx) = tokio::sync::broadcast::channel(256);
        let events = BroadcastDispatcher::new(events_tx);

        let ctx = EvaluationContext {
            round_price: settings.round_price_before_compare,
        };
        let dispatcher: Arc<dyn Dispatcher> = Arc::new(events.clone());
        let engine = AlertEngine::new(
            Arc::clone(&store),
            Arc::clone(&feed),
            dispatcher,
            Arc::new(EmaTracker::new(settings.ema_period)),
            ctx,
        );

        Self {
            settings,
            store,
            feed,
            engine: Arc::new(engine),
            events,
        }
    }
}
