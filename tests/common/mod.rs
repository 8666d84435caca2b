#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use parking_lot::Mutex;
use rust_decimal::Decimal;

use cryptoalerts::config::{Settings, StoreBackend};
use cryptoalerts::error::{AlertError, Result};
use cryptoalerts::models::{Notification, PriceSample, TriggerEvent};
use cryptoalerts::services::alert_condition::EvaluationContext;
use cryptoalerts::services::alert_engine::AlertEngine;
use cryptoalerts::services::dispatcher::Dispatcher;
use cryptoalerts::services::ema_tracker::EmaTracker;
use cryptoalerts::services::notification_store::{
    MemoryNotificationStore, NotificationStore, StateChange,
};
use cryptoalerts::services::price_feed::PriceFeed;

pub const BTC: &str = "BTC-USDT";
pub const ETH: &str = "ETH-USDT";

pub fn test_settings() -> Settings {
    Settings {
        mongodb_uri: "mongodb://localhost:27017".to_string(),
        mongodb_db: "cryptoalerts_test".to_string(),
        store_backend: StoreBackend::Memory,
        host: "127.0.0.1".to_string(),
        port: 0,
        bingx_api_url: "http://localhost:0".to_string(),
        bingx_api_key: String::new(),
        tick_interval_secs: 300,
        ema_period: 9,
        round_price_before_compare: false,
    }
}

/// Price feed driven by the test. Every quote is 60s after the previous one.
#[derive(Default)]
pub struct ScriptedFeed {
    prices: Mutex<HashMap<String, Decimal>>,
    down: Mutex<HashSet<String>>,
    calls: Mutex<HashMap<String, usize>>,
    clock: AtomicI64,
}

impl ScriptedFeed {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, market: &str, price: Decimal) {
        self.prices.lock().insert(market.to_string(), price);
        self.down.lock().remove(market);
    }

    pub fn fail(&self, market: &str) {
        self.down.lock().insert(market.to_string());
    }

    pub fn calls(&self, market: &str) -> usize {
        self.calls.lock().get(market).copied().unwrap_or(0)
    }
}

#[async_trait]
impl PriceFeed for ScriptedFeed {
    async fn get_price(&self, market: &str) -> Result<PriceSample> {
        *self.calls.lock().entry(market.to_string()).or_default() += 1;

        if self.down.lock().contains(market) {
            return Err(AlertError::feed_unavailable(market, "scripted outage"));
        }

        let price = self
            .prices
            .lock()
            .get(market)
            .copied()
            .ok_or_else(|| AlertError::feed_unavailable(market, "no scripted price"))?;

        let ts = self.clock.fetch_add(60, Ordering::SeqCst) + 60;
        PriceSample::new(market, price, ts)
    }
}

#[derive(Default)]
pub struct RecordingDispatcher {
    events: Mutex<Vec<TriggerEvent>>,
    failing: AtomicBool,
}

impl RecordingDispatcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<TriggerEvent> {
        self.events.lock().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl Dispatcher for RecordingDispatcher {
    async fn emit(&self, event: &TriggerEvent) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AlertError::Dispatch("scripted delivery failure".to_string()));
        }
        self.events.lock().push(event.clone());
        Ok(())
    }
}

/// Memory store whose write-backs always lose the race.
pub struct ConflictingStore {
    pub inner: MemoryNotificationStore,
}

#[async_trait]
impl NotificationStore for ConflictingStore {
    async fn load_active(&self) -> Result<Vec<Notification>> {
        self.inner.load_active().await
    }

    async fn save(&self, id: &ObjectId, _change: &StateChange) -> Result<()> {
        Err(AlertError::PersistenceConflict { id: id.to_hex() })
    }

    async fn insert(&self, notification: &Notification) -> Result<()> {
        self.inner.insert(notification).await
    }

    async fn get(&self, id: &ObjectId) -> Result<Option<Notification>> {
        self.inner.get(id).await
    }

    async fn list_for_chat(&self, chat_id: &str, active_only: bool) -> Result<Vec<Notification>> {
        self.inner.list_for_chat(chat_id, active_only).await
    }

    async fn deactivate(&self, id: &ObjectId, chat_id: &str) -> Result<bool> {
        self.inner.deactivate(id, chat_id).await
    }

    async fn delete(&self, id: &ObjectId, chat_id: &str) -> Result<bool> {
        self.inner.delete(id, chat_id).await
    }

    async fn delete_all_for_chat(&self, chat_id: &str) -> Result<u64> {
        self.inner.delete_all_for_chat(chat_id).await
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

pub fn engine(
    store: Arc<dyn NotificationStore>,
    feed: Arc<ScriptedFeed>,
    dispatcher: Arc<RecordingDispatcher>,
    ema_period: u32,
) -> AlertEngine {
    AlertEngine::new(
        store,
        feed,
        dispatcher,
        Arc::new(EmaTracker::new(ema_period)),
        EvaluationContext::default(),
    )
}
