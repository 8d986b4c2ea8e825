use crate::commands;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/sensors/readings",
            post(commands::sensor::record_reading),
        )
        .route(
            "/api/sensors/latest",
            get(commands::sensor::get_latest_reading),
        )
}
