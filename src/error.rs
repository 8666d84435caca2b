use thiserror::Error;

#[derive(Error, Debug)]
pub enum AlertError {
    /// Price sample rejected before touching any state.
    #[error("invalid price sample for {market}: {reason}")]
    InvalidSample { market: String, reason: String },

    #[error("price feed unavailable for {market}: {reason}")]
    FeedUnavailable { market: String, reason: String },

    /// The stored notification no longer matched the state the write-back expected.
    #[error("persistence conflict for notification {id}")]
    PersistenceConflict { id: String },

    #[error("malformed notification {id}: {reason}")]
    MalformedNotification { id: String, reason: String },

    #[error("store error: {0}")]
    Store(#[from] mongodb::error::Error),

    #[error("dispatch failed: {0}")]
    Dispatch(String),

    #[error("scheduler unavailable: {0}")]
    SchedulerUnavailable(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("http server error: {0}")]
    Server(#[from] std::io::Error),

    #[error("invalid value for {field}: {reason}")]
    Config { field: &'static str, reason: String },
}

impl AlertError {
    pub fn invalid_sample(market: &str, reason: impl Into<String>) -> Self {
        Self::InvalidSample {
            market: market.to_string(),
            reason: reason.into(),
        }
    }

    pub fn feed_unavailable(market: &str, reason: impl Into<String>) -> Self {
        Self::FeedUnavailable {
            market: market.to_string(),
            reason: reason.into(),
        }
    }

    pub fn malformed(id: impl ToString, reason: impl Into<String>) -> Self {
        Self::MalformedNotification {
            id: id.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AlertError>;
