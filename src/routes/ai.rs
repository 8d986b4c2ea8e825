use crate::commands;
use crate::state::AppState;
use axum::{routing::post, Router};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/ai/feed-mix", post(commands::ai::optimize_feed_mix))
        .route("/api/ai/health", post(commands::ai::predict_health_issues))
        .route("/api/ai/ask", post(commands::ai::answer_poultry_question))
        .route("/api/ai/scan-receipt", post(commands::ai::scan_receipt))
}
