pub mod alert_condition;
pub mod alert_engine;
pub mod alert_monitor;
pub mod db_init;
pub mod dispatcher;
pub mod ema_tracker;
pub mod notification_store;
pub mod price_feed;

pub mod notifications_service;
