use crate::state::AppState;
use axum::Router;

pub mod ai;
pub mod auth;
pub mod contacts;
pub mod dashboard;
pub mod expenditures;
pub mod flocks;
pub mod profile;
pub mod reports;
pub mod sales;
pub mod sensors;

pub fn create_router() -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .merge(flocks::router())
        .merge(sales::router())
        .merge(expenditures::router())
        .merge(contacts::router())
        .merge(sensors::router())
        .merge(profile::router())
        .merge(dashboard::router())
        .merge(reports::router())
        .merge(ai::router())
}
