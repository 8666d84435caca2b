use axum::{Router, routing::{get, post}};
use crate::{AppState, controllers::home_controller};

pub fn add_routes(router: Router<AppState>) -> Router<AppState> {
    router
        .route("/health", get(home_controller::health))
        .route("/health/db", get(home_controller::health_db))
        .route("/ticks", post(home_controller::post_run_tick))
}
