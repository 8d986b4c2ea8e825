pub mod ai;
pub mod analysis;
pub mod auth;
pub mod contact;
pub mod dashboard;
pub mod expenditure;
pub mod flock;
pub mod profile;
pub mod sales;
pub mod sensor;
