use crate::commands;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/ping", get(commands::auth::ping))
        .route("/api/auth/register", post(commands::auth::register))
        .route("/api/auth/login", post(commands::auth::login))
        .route("/api/auth/check", get(commands::auth::check_auth))
}
