use crate::commands;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/sales", get(commands::sales::get_sales))
        .route("/api/sales", post(commands::sales::create_sale))
        .route("/api/sales/update", post(commands::sales::update_sale))
        .route("/api/sales/delete", post(commands::sales::delete_sale))
}
