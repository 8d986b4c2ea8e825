use crate::commands;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/flocks", get(commands::flock::get_flocks))
        .route("/api/flocks", post(commands::flock::create_flock))
        .route("/api/flocks/update", post(commands::flock::update_flock))
        .route("/api/flocks/delete", post(commands::flock::delete_flock))
        .route("/api/flocks/loss", post(commands::flock::record_loss))
        .route("/api/flocks/eggs", post(commands::flock::record_eggs))
        .route("/api/flocks/metrics", get(commands::flock::get_flock_metrics))
}
