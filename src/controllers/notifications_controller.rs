use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    models::{ConditionKind, EmaCross, Notification, PercentBounds, RangeBounds},
    services::notifications_service,
    AppState,
};

/// API shape of a notification: hex id, market key, everything else as stored.
#[derive(Debug, Serialize)]
pub struct NotificationView {
    pub id: String,
    pub chat_id: String,
    pub market: String,
    pub symbol: String,
    pub quote: String,
    pub kind: ConditionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<RangeBounds>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent: Option<PercentBounds>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ema_cross: Option<EmaCross>,
    pub is_active: bool,
    pub created_at: i64,
    pub triggered_at: Option<i64>,
}

impl From<Notification> for NotificationView {
    fn from(n: Notification) -> Self {
        Self {
            id: n.id.to_hex(),
            market: n.market(),
            is_active: n.is_active,
            chat_id: n.chat_id,
            symbol: n.symbol,
            quote: n.quote,
            kind: n.kind,
            range: n.range,
            percent: n.percent,
            ema_cross: n.ema_cross,
            created_at: n.created_at,
            triggered_at: n.triggered_at,
        }
    }
}

#[derive(Deserialize)]
pub struct CreateRangeBody {
    pub chat_id: String,
    pub symbol: String,
    pub quote: String,
    pub lower: Decimal,
    pub upper: Decimal,
}

#[derive(Deserialize)]
pub struct CreatePercentBody {
    pub chat_id: String,
    pub symbol: String,
    pub quote: String,
    #[serde(default)]
    pub down_percent: Decimal,
    #[serde(default)]
    pub up_percent: Decimal,
}

#[derive(Deserialize)]
pub struct CreateEmaBody {
    pub chat_id: String,
    pub symbol: String,
    pub quote: String,
}

#[derive(Deserialize)]
pub struct ChatQuery {
    pub chat_id: String,
    #[serde(default)]
    pub active: Option<bool>,
}

fn created(n: Notification) -> Response {
    (StatusCode::CREATED, Json(NotificationView::from(n))).into_response()
}

// POST /notifications/range
pub async fn post_create_range(
    State(state): State<AppState>,
    Json(body): Json<CreateRangeBody>,
) -> Response {
    match notifications_service::create_range(
        &state,
        &body.chat_id,
        &body.symbol,
        &body.quote,
        body.lower,
        body.upper,
    )
    .await
    {
        Ok(n) => created(n),
        Err(e) => e.into_response(),
    }
}

// POST /notifications/percent
pub async fn post_create_percent(
    State(state): State<AppState>,
    Json(body): Json<CreatePercentBody>,
) -> Response {
    match notifications_service::create_percent(
        &state,
        &body.chat_id,
        &body.symbol,
        &body.quote,
        body.down_percent,
        body.up_percent,
    )
    .await
    {
        Ok(n) => created(n),
        Err(e) => e.into_response(),
    }
}

// POST /notifications/ema
pub async fn post_create_ema(
    State(state): State<AppState>,
    Json(body): Json<CreateEmaBody>,
) -> Response {
    match notifications_service::create_ema(&state, &body.chat_id, &body.symbol, &body.quote).await {
        Ok(n) => created(n),
        Err(e) => e.into_response(),
    }
}

// GET /notifications?chat_id=..&active=true
pub async fn get_notifications(
    State(state): State<AppState>,
    Query(q): Query<ChatQuery>,
) -> Response {
    let active_only = q.active.unwrap_or(false);

    match notifications_service::list_for_chat(&state, &q.chat_id, active_only).await {
        Ok(items) => {
            let items: Vec<NotificationView> = items.into_iter().map(Into::into).collect();
            (StatusCode::OK, Json(json!({ "notifications": items }))).into_response()
        }
        Err(e) => e.into_response(),
    }
}

// GET /notifications/:id
pub async fn get_notification(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match notifications_service::get(&state, &id).await {
        Ok(n) => (StatusCode::OK, Json(NotificationView::from(n))).into_response(),
        Err(e) => e.into_response(),
    }
}

// POST /notifications/:id/deactivate?chat_id=..
pub async fn post_deactivate(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(q): Query<ChatQuery>,
) -> Response {
    match notifications_service::deactivate(&state, &id, &q.chat_id).await {
        Ok(n) => (StatusCode::OK, Json(NotificationView::from(n))).into_response(),
        Err(e) => e.into_response(),
    }
}

// DELETE /notifications/:id?chat_id=..
pub async fn delete_notification(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(q): Query<ChatQuery>,
) -> Response {
    match notifications_service::delete(&state, &id, &q.chat_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}

// DELETE /notifications?chat_id=..
pub async fn delete_all_notifications(
    State(state): State<AppState>,
    Query(q): Query<ChatQuery>,
) -> Response {
    match notifications_service::delete_all(&state, &q.chat_id).await {
        Ok(removed) => (StatusCode::OK, Json(json!({ "deleted": removed }))).into_response(),
        Err(e) => e.into_response(),
    }
}
