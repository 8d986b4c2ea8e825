use crate::commands;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/profile", get(commands::profile::get_profile))
        .route("/api/profile/save", post(commands::profile::save_profile))
}
