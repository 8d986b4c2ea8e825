use axum::extract::{Extension, Json, Query, State};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::commands::flock::lock_flock;
use crate::db::Sale;
use crate::error::{CluckError, CluckResult};
use crate::middleware::auth::Claims;
use crate::state::AppState;

/// A sale can never take more birds than the flock currently holds.
pub fn validate_sale_quantity(quantity: i32, bird_count: i32) -> CluckResult<()> {
    if quantity <= 0 {
        return Err(CluckError::Validation(
            "Sale quantity must be positive".into(),
        ));
    }
    if quantity > bird_count {
        return Err(CluckError::Validation(format!(
            "Insufficient birds: tried to sell {} but flock only has {}",
            quantity, bird_count
        )));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSaleInput {
    pub flock_id: String,
    pub quantity: i32,
    pub price_per_unit: f64,
    pub customer: Option<String>,
    pub sale_date: NaiveDate,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSaleInput {
    pub sale_id: String,
    pub flock_id: String,
    pub quantity: i32,
    pub price_per_unit: f64,
    pub customer: Option<String>,
    pub sale_date: NaiveDate,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSaleInput {
    pub sale_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesQuery {
    pub flock_id: Option<String>,
}

pub async fn get_sales(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<SalesQuery>,
) -> CluckResult<Json<Vec<Sale>>> {
    let sales: Vec<Sale> = if let Some(flock_id) = query.flock_id {
        sqlx::query_as(
            "SELECT * FROM sales WHERE owner_id = $1 AND flock_id = $2 ORDER BY sale_date DESC, created_at DESC",
        )
        .bind(claims.user_id)
        .bind(flock_id)
        .fetch_all(&state.pool)
        .await?
    } else {
        sqlx::query_as("SELECT * FROM sales WHERE owner_id = $1 ORDER BY sale_date DESC, created_at DESC")
            .bind(claims.user_id)
            .fetch_all(&state.pool)
            .await?
    };
    Ok(Json(sales))
}

/// Persists the sale and decrements the flock's bird count in one
/// transaction, so a failed aggregate update can never leave an orphaned
/// sale behind.
pub async fn create_sale(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(input): Json<CreateSaleInput>,
) -> CluckResult<Json<Sale>> {
    if input.price_per_unit < 0.0 {
        return Err(CluckError::Validation(
            "Price per unit cannot be negative".into(),
        ));
    }

    let mut tx = state.pool.begin().await?;
    let flock = lock_flock(&mut tx, claims.user_id, &input.flock_id).await?;
    validate_sale_quantity(input.quantity, flock.bird_count)?;

    let sale_id = format!("S-{}", &uuid::Uuid::new_v4().to_string()[..8].to_uppercase());
    let total_amount = input.quantity as f64 * input.price_per_unit;

    let sale: Sale = sqlx::query_as(
        "INSERT INTO sales (sale_id, owner_id, flock_id, quantity, price_per_unit, total_amount, customer, sale_date)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         RETURNING *",
    )
    .bind(&sale_id)
    .bind(claims.user_id)
    .bind(&input.flock_id)
    .bind(input.quantity)
    .bind(input.price_per_unit)
    .bind(total_amount)
    .bind(&input.customer)
    .bind(input.sale_date)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        "UPDATE flocks SET bird_count = bird_count - $1, updated_at = now() WHERE flock_id = $2",
    )
    .bind(input.quantity)
    .bind(&input.flock_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(Json(sale))
}

/// Reconciles the bird count against the old and new flock. Same flock:
/// only the quantity delta moves. Different flock: the full original
/// quantity is returned to the old flock and the full new quantity is
/// deducted from the new one.
pub async fn update_sale(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(input): Json<UpdateSaleInput>,
) -> CluckResult<Json<Sale>> {
    if input.price_per_unit < 0.0 {
        return Err(CluckError::Validation(
            "Price per unit cannot be negative".into(),
        ));
    }
    if input.quantity <= 0 {
        return Err(CluckError::Validation(
            "Sale quantity must be positive".into(),
        ));
    }

    let mut tx = state.pool.begin().await?;

    let old: Option<Sale> =
        sqlx::query_as("SELECT * FROM sales WHERE sale_id = $1 AND owner_id = $2 FOR UPDATE")
            .bind(&input.sale_id)
            .bind(claims.user_id)
            .fetch_optional(&mut *tx)
            .await?;
    let old = old.ok_or_else(|| {
        CluckError::Validation(format!("Sale {} not found", input.sale_id))
    })?;

    if old.flock_id == input.flock_id {
        let flock = lock_flock(&mut tx, claims.user_id, &input.flock_id).await?;
        let delta = input.quantity - old.quantity;
        if delta > flock.bird_count {
            return Err(CluckError::Validation(format!(
                "Insufficient birds: increasing this sale by {} exceeds the flock's {}",
                delta, flock.bird_count
            )));
        }
        // Negative delta returns birds; never past the initial count.
        let new_count = (flock.bird_count - delta).min(flock.initial_count);
        sqlx::query(
            "UPDATE flocks SET bird_count = $1, updated_at = now() WHERE flock_id = $2",
        )
        .bind(new_count)
        .bind(&input.flock_id)
        .execute(&mut *tx)
        .await?;
    } else {
        // Restore the original flock first; tolerate it having been deleted.
        let old_flock = sqlx::query_as::<_, crate::db::Flock>(
            "SELECT * FROM flocks WHERE flock_id = $1 AND owner_id = $2 FOR UPDATE",
        )
        .bind(&old.flock_id)
        .bind(claims.user_id)
        .fetch_optional(&mut *tx)
        .await?;
        if let Some(old_flock) = old_flock {
            let restored = (old_flock.bird_count + old.quantity).min(old_flock.initial_count);
            sqlx::query(
                "UPDATE flocks SET bird_count = $1, updated_at = now() WHERE flock_id = $2",
            )
            .bind(restored)
            .bind(&old.flock_id)
            .execute(&mut *tx)
            .await?;
        }

        let new_flock = lock_flock(&mut tx, claims.user_id, &input.flock_id).await?;
        validate_sale_quantity(input.quantity, new_flock.bird_count)?;
        sqlx::query(
            "UPDATE flocks SET bird_count = bird_count - $1, updated_at = now() WHERE flock_id = $2",
        )
        .bind(input.quantity)
        .bind(&input.flock_id)
        .execute(&mut *tx)
        .await?;
    }

    let total_amount = input.quantity as f64 * input.price_per_unit;
    let sale: Sale = sqlx::query_as(
        "UPDATE sales SET flock_id = $1, quantity = $2, price_per_unit = $3, total_amount = $4, customer = $5, sale_date = $6
         WHERE sale_id = $7
         RETURNING *",
    )
    .bind(&input.flock_id)
    .bind(input.quantity)
    .bind(input.price_per_unit)
    .bind(total_amount)
    .bind(&input.customer)
    .bind(input.sale_date)
    .bind(&input.sale_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(Json(sale))
}

/// Reverse of create: the sold quantity goes back to the flock before the
/// sale row is removed. A sale pointing at a deleted flock still deletes.
pub async fn delete_sale(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(input): Json<DeleteSaleInput>,
) -> CluckResult<Json<()>> {
    let mut tx = state.pool.begin().await?;

    let old: Option<Sale> =
        sqlx::query_as("SELECT * FROM sales WHERE sale_id = $1 AND owner_id = $2 FOR UPDATE")
            .bind(&input.sale_id)
            .bind(claims.user_id)
            .fetch_optional(&mut *tx)
            .await?;
    let old = old.ok_or_else(|| {
        CluckError::Validation(format!("Sale {} not found", input.sale_id))
    })?;

    let flock = sqlx::query_as::<_, crate::db::Flock>(
        "SELECT * FROM flocks WHERE flock_id = $1 AND owner_id = $2 FOR UPDATE",
    )
    .bind(&old.flock_id)
    .bind(claims.user_id)
    .fetch_optional(&mut *tx)
    .await?;
    if let Some(flock) = flock {
        let restored = (flock.bird_count + old.quantity).min(flock.initial_count);
        sqlx::query("UPDATE flocks SET bird_count = $1, updated_at = now() WHERE flock_id = $2")
            .bind(restored)
            .bind(&old.flock_id)
            .execute(&mut *tx)
            .await?;
    }

    sqlx::query("DELETE FROM sales WHERE sale_id = $1")
        .bind(&input.sale_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(Json(()))
}
