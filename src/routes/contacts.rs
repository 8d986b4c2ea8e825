use crate::commands;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/contacts", get(commands::contact::get_contacts))
        .route("/api/contacts", post(commands::contact::create_contact))
        .route(
            "/api/contacts/update",
            post(commands::contact::update_contact),
        )
        .route(
            "/api/contacts/delete",
            post(commands::contact::delete_contact),
        )
}
