use chrono::Utc;
use mongodb::bson::oid::ObjectId;
use rust_decimal::Decimal;

use crate::error::{AlertError, Result};
use crate::models::price::{market_key, normalize_ticker};
use crate::models::{Notification, PercentBounds, RangeBounds};
use crate::AppState;

pub fn parse_id(raw: &str) -> Result<ObjectId> {
    ObjectId::parse_str(raw.trim())
        .map_err(|_| AlertError::InvalidRequest(format!("'{raw}' is not a notification id")))
}

fn require_chat(chat_id: &str) -> Result<String> {
    let c = chat_id.trim();
    if c.is_empty() {
        return Err(AlertError::InvalidRequest("chat_id is required".to_string()));
    }
    Ok(c.to_string())
}

fn subject(symbol: &str, quote: &str) -> Result<(String, String)> {
    Ok((normalize_ticker("symbol", symbol)?, normalize_ticker("quote", quote)?))
}

pub async fn create_range(
    state: &AppState,
    chat_id: &str,
    symbol: &str,
    quote: &str,
    lower: Decimal,
    upper: Decimal,
) -> Result<Notification> {
    let chat = require_chat(chat_id)?;
    let (sym, quote) = subject(symbol, quote)?;

    let bounds = RangeBounds::new(lower, upper);
    if bounds.lower_boundary <= Decimal::ZERO {
        return Err(AlertError::InvalidRequest("lower boundary must be positive".into()));
    }
    if bounds.lower_boundary >= bounds.upper_boundary {
        return Err(AlertError::InvalidRequest(
            "lower boundary must be below upper boundary".into(),
        ));
    }

    let n = Notification::range(&chat, &sym, &quote, bounds, Utc::now().timestamp());
    state.store.insert(&n).await?;

    tracing::info!(notification_id = %n.id.to_hex(), market = %n.market(), "range alert created");
    Ok(n)
}

/// Bounds are derived from the current feed price and never recomputed.
pub async fn create_percent(
    state: &AppState,
    chat_id: &str,
    symbol: &str,
    quote: &str,
    down_percent: Decimal,
    up_percent: Decimal,
) -> Result<Notification> {
    let chat = require_chat(chat_id)?;
    let (sym, quote) = subject(symbol, quote)?;

    if down_percent < Decimal::ZERO || down_percent >= Decimal::ONE_HUNDRED {
        return Err(AlertError::InvalidRequest(
            "down_percent must be in [0, 100)".into(),
        ));
    }
    if up_percent < Decimal::ZERO {
        return Err(AlertError::InvalidRequest("up_percent must not be negative".into()));
    }
    if down_percent.is_zero() && up_percent.is_zero() {
        return Err(AlertError::InvalidRequest(
            "at least one of down_percent, up_percent must be set".into(),
        ));
    }

    let sample = state.feed.get_price(&market_key(&sym, &quote)).await?;
    let bounds = PercentBounds::derive(sample.price, down_percent, up_percent)?;

    let n = Notification::percent(&chat, &sym, &quote, bounds, Utc::now().timestamp());
    state.store.insert(&n).await?;

    tracing::info!(
        notification_id = %n.id.to_hex(),
        market = %n.market(),
        start_price = %sample.price,
        "percent alert created"
    );
    Ok(n)
}

/// Starts from the market's tracked EMA when there is one, otherwise from the price.
pub async fn create_ema(state: &AppState, chat_id: &str, symbol: &str, quote: &str) -> Result<Notification> {
    let chat = require_chat(chat_id)?;
    let (sym, quote) = subject(symbol, quote)?;
    let market = market_key(&sym, &quote);

    let sample = state.feed.get_price(&market).await?;
    let start_ema = state
        .engine
        .ema_tracker()
        .current(&market)
        .unwrap_or(sample.price);

    let n = Notification::ema_cross(&chat, &sym, &quote, start_ema, sample.price, Utc::now().timestamp());
    state.store.insert(&n).await?;

    tracing::info!(
        notification_id = %n.id.to_hex(),
        market = %market,
        start_ema = %start_ema,
        "EMA alert created"
    );
    Ok(n)
}

pub async fn list_for_chat(state: &AppState, chat_id: &str, active_only: bool) -> Result<Vec<Notification>> {
    let chat = require_chat(chat_id)?;
    state.store.list_for_chat(&chat, active_only).await
}

pub async fn get(state: &AppState, id: &str) -> Result<Notification> {
    let oid = parse_id(id)?;
    state
        .store
        .get(&oid)
        .await?
        .ok_or_else(|| AlertError::NotFound(format!("notification {id}")))
}

/// Explicit deactivation. Trend (EmaCross) alerts are permanently active and can only be deleted.
pub async fn deactivate(state: &AppState, id: &str, chat_id: &str) -> Result<Notification> {
    let chat = require_chat(chat_id)?;
    let n = get(state, id).await?;

    if n.chat_id != chat {
        return Err(AlertError::NotFound(format!("notification {id}")));
    }
    if !n.kind.is_terminal() {
        return Err(AlertError::InvalidRequest(
            "EMA alerts are always active; delete them instead".into(),
        ));
    }
    if !n.is_active {
        return Err(AlertError::InvalidRequest(format!("notification {id} is already inactive")));
    }

    if !state.store.deactivate(&n.id, &chat).await? {
        return Err(AlertError::PersistenceConflict { id: n.id.to_hex() });
    }

    get(state, id).await
}

pub async fn delete(state: &AppState, id: &str, chat_id: &str) -> Result<()> {
    let chat = require_chat(chat_id)?;
    let oid = parse_id(id)?;

    if !state.store.delete(&oid, &chat).await? {
        return Err(AlertError::NotFound(format!("notification {id}")));
    }
    Ok(())
}

pub async fn delete_all(state: &AppState, chat_id: &str) -> Result<u64> {
    let chat = require_chat(chat_id)?;
    let removed = state.store.delete_all_for_chat(&chat).await?;

    tracing::info!(chat_id = %chat, removed, "alerts deleted");
    Ok(removed)
}
