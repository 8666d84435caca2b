use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{AlertError, Result};
use crate::services::ema_tracker::{DEFAULT_EMA_PERIOD, MAX_EMA_PERIOD};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Mongo,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = AlertError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_lowercase().as_str() {
            "mongo" => Ok(StoreBackend::Mongo),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(AlertError::Config {
                field: "STORE_BACKEND",
                reason: format!("expected 'mongo' or 'memory', got '{other}'"),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub mongodb_uri: String,
    pub mongodb_db: String,
    pub store_backend: StoreBackend,

    pub host: String,
    pub port: u16,

    pub bingx_api_url: String,
    pub bingx_api_key: String,

    pub tick_interval_secs: u64,
    pub ema_period: u32,
    pub round_price_before_compare: bool,
}

impl Settings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tick_interval_secs == 0 {
            return Err(AlertError::Config {
                field: "ALERT_TICK_SECS",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.ema_period == 0 || self.ema_period > MAX_EMA_PERIOD {
            return Err(AlertError::Config {
                field: "EMA_PERIOD",
                reason: format!("must be between 1 and {MAX_EMA_PERIOD}"),
            });
        }
        if self.bingx_api_url.trim().is_empty() {
            return Err(AlertError::Config {
                field: "BINGX_API_URL",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

fn flag(name: &str) -> bool {
    env::var(name)
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

pub fn load() -> Result<Settings> {
    // Loads .env if present (no crash if missing)
    dotenvy::dotenv().ok();

    let mongodb_uri = env::var("MONGODB_URI")
        .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());

    let mongodb_db = env::var("MONGODB_DB")
        .unwrap_or_else(|_| "cryptoalerts".to_string());

    let store_backend = match env::var("STORE_BACKEND") {
        Ok(raw) => raw.parse::<StoreBackend>()?,
        Err(_) => StoreBackend::Mongo,
    };

    let host = env::var("HOST")
        .unwrap_or_else(|_| "127.0.0.1".to_string());

    let port = env::var("PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(3000);

    let bingx_api_url = env::var("BINGX_API_URL")
        .unwrap_or_else(|_| "https://open-api.bingx.com".to_string());
    let bingx_api_key = env::var("BINGX_API_KEY").unwrap_or_default();

    let tick_interval_secs = env::var("ALERT_TICK_SECS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(300);

    let ema_period = env::var("EMA_PERIOD")
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(DEFAULT_EMA_PERIOD);

    Ok(Settings {
        mongodb_uri,
        mongodb_db,
        store_backend,
        host,
        port,
        bingx_api_url,
        bingx_api_key,
        tick_interval_secs,
        ema_period,
        round_price_before_compare: flag("ROUND_PRICE_BEFORE_COMPARE"),
    })
}
