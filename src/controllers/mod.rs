use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

use crate::error::AlertError;

pub mod home_controller;
pub mod notifications_controller;
pub mod realtime_controller;

impl AlertError {
    pub fn status(&self) -> StatusCode {
        match self {
            AlertError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AlertError::NotFound(_) => StatusCode::NOT_FOUND,
            AlertError::FeedUnavailable { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AlertError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
