use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::{FromRow, Pool, Postgres};
use std::str::FromStr;

use crate::error::{CluckError, CluckResult};

pub type DbPool = Pool<Postgres>;

pub async fn init_pool_with_options(opts: PgConnectOptions) -> CluckResult<DbPool> {
    // connect_lazy_with returns the pool immediately; connections are opened on demand.
    Ok(PgPoolOptions::new()
        .max_connections(20)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .idle_timeout(std::time::Duration::from_secs(120))
        .max_lifetime(std::time::Duration::from_secs(300))
        .connect_lazy_with(opts))
}

pub async fn init_pool(database_url: &str) -> CluckResult<DbPool> {
    let opts = PgConnectOptions::from_str(database_url)
        .map_err(|e| CluckError::Internal(format!("Invalid DB URL: {}", e)))?
        .ssl_mode(PgSslMode::Prefer);

    init_pool_with_options(opts).await
}

pub async fn init_database(pool: &DbPool) -> CluckResult<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    let _ = ensure_seeds(pool).await;
    tracing::info!("Database ready");
    Ok(())
}

async fn ensure_seeds(pool: &DbPool) -> CluckResult<()> {
    let admin_email =
        std::env::var("ADMIN_EMAIL").unwrap_or_else(|_| "admin@cluckhub.local".to_string());

    let admin_exists: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE email = $1")
        .bind(&admin_email)
        .fetch_one(pool)
        .await
        .unwrap_or((0,));
    if admin_exists.0 == 0 {
        if let Ok(hash) = bcrypt::hash("admin", bcrypt::DEFAULT_COST) {
            let row: Result<(i32,), _> = sqlx::query_as(
                "INSERT INTO users (email, password_hash, display_name) VALUES ($1, $2, 'Administrator')
                 ON CONFLICT (email) DO NOTHING RETURNING id",
            )
            .bind(&admin_email)
            .bind(hash)
            .fetch_one(pool)
            .await;
            if let Ok((id,)) = row {
                let _ = sqlx::query(
                    "INSERT INTO user_profiles (owner_id, display_name, farm_name) VALUES ($1, 'Administrator', 'CluckHub Farm')
                     ON CONFLICT (owner_id) DO NOTHING",
                )
                .bind(id)
                .execute(pool)
                .await;
            }
        }
    }
    Ok(())
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i32,
    pub email: String,
    pub password_hash: String,
    pub display_name: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Flock {
    pub flock_id: String,
    pub owner_id: i32,
    pub breed: String,
    pub flock_type: String,
    pub bird_count: i32,
    pub initial_count: i32,
    pub hatch_date: NaiveDate,
    pub average_weight: f64,
    pub total_feed_consumed: f64,
    pub total_cost: f64,
    pub egg_production_rate: f64,
    pub total_eggs_collected: i32,
    #[sqlx(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[sqlx(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    pub sale_id: String,
    pub owner_id: i32,
    pub flock_id: String,
    pub quantity: i32,
    pub price_per_unit: f64,
    pub total_amount: f64,
    pub customer: Option<String>,
    pub sale_date: NaiveDate,
    #[sqlx(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Expenditure {
    pub expenditure_id: String,
    pub owner_id: i32,
    pub category: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub amount: f64,
    pub description: Option<String>,
    pub expenditure_date: NaiveDate,
    pub flock_id: Option<String>,
    #[sqlx(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub contact_id: String,
    pub owner_id: i32,
    pub name: String,
    pub contact_type: String,
    pub contact_person: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub products: Option<String>,
    #[sqlx(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SensorReading {
    pub reading_id: i32,
    pub owner_id: i32,
    pub temperature: f64,
    pub humidity: f64,
    pub ammonia_level: f64,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub owner_id: i32,
    pub display_name: Option<String>,
    pub farm_name: Option<String>,
    pub farm_location: Option<String>,
    pub farm_contact: Option<String>,
    pub currency: String,
    #[sqlx(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DashboardTotals {
    pub flock_count: Option<i64>,
    pub total_birds: Option<i64>,
    pub total_initial_birds: Option<i64>,
    pub total_eggs_collected: Option<i64>,
    pub total_revenue: Option<f64>,
    pub total_sales_count: Option<i64>,
    pub recent_sales_count: Option<i64>,
    pub total_expenditure: Option<f64>,
}
