use crate::commands;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/reports/monthly",
            post(commands::analysis::get_monthly_report),
        )
        .route(
            "/api/reports/reconciliation",
            get(commands::analysis::get_reconciliation_report),
        )
}
