use axum::extract::{Extension, Json, State};
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::{Postgres, Transaction};

use crate::db::Flock;
use crate::error::{CluckError, CluckResult};
use crate::metrics::{self, FlockMetrics, HerdSummary};
use crate::middleware::auth::Claims;
use crate::state::AppState;

pub fn validate_flock_type(flock_type: &str) -> CluckResult<()> {
    match flock_type {
        metrics::FLOCK_TYPE_BROILER | metrics::FLOCK_TYPE_LAYER => Ok(()),
        other => Err(CluckError::Validation(format!(
            "Unknown flock type '{}' (expected Broiler or Layer)",
            other
        ))),
    }
}

/// Locks the flock row for the rest of the transaction so concurrent
/// aggregate updates against the same flock serialize instead of racing.
pub async fn lock_flock(
    tx: &mut Transaction<'_, Postgres>,
    owner_id: i32,
    flock_id: &str,
) -> CluckResult<Flock> {
    let flock: Option<Flock> =
        sqlx::query_as("SELECT * FROM flocks WHERE flock_id = $1 AND owner_id = $2 FOR UPDATE")
            .bind(flock_id)
            .bind(owner_id)
            .fetch_optional(&mut **tx)
            .await?;
    flock.ok_or_else(|| CluckError::Validation(format!("Flock {} not found", flock_id)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFlockInput {
    pub breed: String,
    pub flock_type: String,
    pub initial_count: i32,
    pub hatch_date: NaiveDate,
    pub average_weight: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFlockInput {
    pub flock_id: String,
    pub breed: String,
    pub flock_type: String,
    pub hatch_date: NaiveDate,
    pub average_weight: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlockIdInput {
    pub flock_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordLossInput {
    pub flock_id: String,
    pub count: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordEggsInput {
    pub flock_id: String,
    pub count: i32,
}

pub async fn get_flocks(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> CluckResult<Json<Vec<Flock>>> {
    let flocks: Vec<Flock> =
        sqlx::query_as("SELECT * FROM flocks WHERE owner_id = $1 ORDER BY hatch_date DESC")
            .bind(claims.user_id)
            .fetch_all(&state.pool)
            .await?;
    Ok(Json(flocks))
}

pub async fn create_flock(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(input): Json<CreateFlockInput>,
) -> CluckResult<Json<Flock>> {
    validate_flock_type(&input.flock_type)?;
    if input.breed.trim().is_empty() {
        return Err(CluckError::Validation("Breed is required".into()));
    }
    if input.initial_count <= 0 {
        return Err(CluckError::Validation(
            "Initial count must be positive".into(),
        ));
    }
    let average_weight = input.average_weight.unwrap_or(0.0);
    if average_weight < 0.0 {
        return Err(CluckError::Validation(
            "Average weight cannot be negative".into(),
        ));
    }

    let flock_id = format!("F-{}", &uuid::Uuid::new_v4().to_string()[..8].to_uppercase());

    let flock: Flock = sqlx::query_as(
        "INSERT INTO flocks (flock_id, owner_id, breed, flock_type, bird_count, initial_count, hatch_date, average_weight)
         VALUES ($1, $2, $3, $4, $5, $5, $6, $7)
         RETURNING *",
    )
    .bind(&flock_id)
    .bind(claims.user_id)
    .bind(input.breed.trim())
    .bind(&input.flock_type)
    .bind(input.initial_count)
    .bind(input.hatch_date)
    .bind(average_weight)
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(flock))
}

/// Ledger-derived aggregates (total_cost, total_feed_consumed,
/// total_eggs_collected, bird_count) are deliberately not editable here;
/// the sale/expenditure/loss/egg operations are their single source of truth.
pub async fn update_flock(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(input): Json<UpdateFlockInput>,
) -> CluckResult<Json<Flock>> {
    validate_flock_type(&input.flock_type)?;
    if input.breed.trim().is_empty() {
        return Err(CluckError::Validation("Breed is required".into()));
    }
    if input.average_weight < 0.0 {
        return Err(CluckError::Validation(
            "Average weight cannot be negative".into(),
        ));
    }

    let flock: Option<Flock> = sqlx::query_as(
        "UPDATE flocks SET breed = $1, flock_type = $2, hatch_date = $3, average_weight = $4, updated_at = now()
         WHERE flock_id = $5 AND owner_id = $6
         RETURNING *",
    )
    .bind(input.breed.trim())
    .bind(&input.flock_type)
    .bind(input.hatch_date)
    .bind(input.average_weight)
    .bind(&input.flock_id)
    .bind(claims.user_id)
    .fetch_optional(&state.pool)
    .await?;

    let flock =
        flock.ok_or_else(|| CluckError::Validation(format!("Flock {} not found", input.flock_id)))?;
    Ok(Json(flock))
}

/// Removes the flock document only. Historical sales and expenditures keep
/// their flock_id; the reconciliation report surfaces them as orphans.
pub async fn delete_flock(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(input): Json<FlockIdInput>,
) -> CluckResult<Json<()>> {
    let result = sqlx::query("DELETE FROM flocks WHERE flock_id = $1 AND owner_id = $2")
        .bind(&input.flock_id)
        .bind(claims.user_id)
        .execute(&state.pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(CluckError::Validation(format!(
            "Flock {} not found",
            input.flock_id
        )));
    }
    Ok(Json(()))
}

pub async fn record_loss(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(input): Json<RecordLossInput>,
) -> CluckResult<Json<Flock>> {
    if input.count <= 0 {
        return Err(CluckError::Validation("Loss count must be positive".into()));
    }

    let mut tx = state.pool.begin().await?;
    let flock = lock_flock(&mut tx, claims.user_id, &input.flock_id).await?;

    if input.count > flock.bird_count {
        return Err(CluckError::Validation(format!(
            "Cannot record loss of {} birds; flock only has {}",
            input.count, flock.bird_count
        )));
    }

    let updated: Flock = sqlx::query_as(
        "UPDATE flocks SET bird_count = bird_count - $1, updated_at = now() WHERE flock_id = $2 RETURNING *",
    )
    .bind(input.count)
    .bind(&input.flock_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(Json(updated))
}

pub async fn record_eggs(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(input): Json<RecordEggsInput>,
) -> CluckResult<Json<Flock>> {
    if input.count <= 0 {
        return Err(CluckError::Validation("Egg count must be positive".into()));
    }

    let mut tx = state.pool.begin().await?;
    let flock = lock_flock(&mut tx, claims.user_id, &input.flock_id).await?;

    if flock.flock_type != metrics::FLOCK_TYPE_LAYER {
        return Err(CluckError::Validation(
            "Egg collection can only be recorded for Layer flocks".into(),
        ));
    }

    let new_total = flock.total_eggs_collected + input.count;
    let age_weeks = metrics::age_in_weeks(flock.hatch_date, chrono::Local::now().date_naive());
    let rate = metrics::egg_production_rate(new_total, age_weeks, flock.bird_count);

    let updated: Flock = sqlx::query_as(
        "UPDATE flocks SET total_eggs_collected = $1, egg_production_rate = $2, updated_at = now()
         WHERE flock_id = $3 RETURNING *",
    )
    .bind(new_total)
    .bind(rate)
    .bind(&input.flock_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(Json(updated))
}

pub async fn get_flock_metrics(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> CluckResult<Json<serde_json::Value>> {
    let flocks: Vec<Flock> =
        sqlx::query_as("SELECT * FROM flocks WHERE owner_id = $1 ORDER BY hatch_date DESC")
            .bind(claims.user_id)
            .fetch_all(&state.pool)
            .await?;

    let today = chrono::Local::now().date_naive();
    let per_flock: Vec<FlockMetrics> = flocks
        .iter()
        .map(|f| FlockMetrics::compute(f, today))
        .collect();
    let summary = HerdSummary::compute(&per_flock, &flocks);

    Ok(Json(serde_json::json!({
        "flocks": per_flock,
        "summary": summary,
    })))
}
