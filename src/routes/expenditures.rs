use crate::commands;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/expenditures",
            get(commands::expenditure::get_expenditures),
        )
        .route(
            "/api/expenditures",
            post(commands::expenditure::create_expenditure),
        )
        .route(
            "/api/expenditures/update",
            post(commands::expenditure::update_expenditure),
        )
        .route(
            "/api/expenditures/delete",
            post(commands::expenditure::delete_expenditure),
        )
        .route(
            "/api/expenditures/import",
            post(commands::expenditure::import_expenditures),
        )
        .route(
            "/api/expenditures/import/template",
            get(commands::expenditure::import_template),
        )
}
