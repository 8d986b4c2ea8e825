use axum::extract::{Extension, Json, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{Postgres, Transaction};

use crate::commands::flock::lock_flock;
use crate::db::Expenditure;
use crate::error::{CluckError, CluckResult};
use crate::middleware::auth::Claims;
use crate::state::AppState;

pub const CATEGORIES: [&str; 7] = [
    "Feed",
    "Medicine",
    "Maintenance",
    "Labor",
    "Utilities",
    "Equipment",
    "Other",
];

/// Categories whose costs are booked against a specific flock.
pub const FLOCK_ATTRIBUTABLE: [&str; 3] = ["Feed", "Medicine", "Maintenance"];

pub const CSV_HEADER: &str = "category,quantity,unitPrice,description,expenditureDate,flockId";

pub fn is_flock_attributable(category: &str) -> bool {
    FLOCK_ATTRIBUTABLE.contains(&category)
}

/// A validated expenditure ready to persist.
#[derive(Debug, Clone)]
pub struct NewExpenditure {
    pub category: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub amount: f64,
    pub description: Option<String>,
    pub expenditure_date: NaiveDate,
    pub flock_id: Option<String>,
}

/// Field-level validation shared by the create handler and the CSV import.
pub fn validate_expenditure_fields(
    category: &str,
    quantity: f64,
    unit_price: f64,
    flock_id: Option<&str>,
) -> Result<f64, (String, String)> {
    if !CATEGORIES.contains(&category) {
        return Err((
            "category".into(),
            format!("Unknown category '{}'", category),
        ));
    }
    let amount = quantity * unit_price;
    if quantity <= 0.0 {
        return Err(("quantity".into(), "Quantity must be positive".into()));
    }
    if amount <= 0.0 {
        return Err(("unitPrice".into(), "Amount must be positive".into()));
    }
    if is_flock_attributable(category) && flock_id.map_or(true, |f| f.trim().is_empty()) {
        return Err((
            "flockId".into(),
            format!("Category '{}' requires a flock", category),
        ));
    }
    Ok(amount)
}

pub fn parse_expenditure_date(date_str: &str) -> Option<NaiveDate> {
    if date_str.trim().is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(date_str, "%Y%m%d"))
        .ok()
}

/// Adds the given deltas to a flock's running sums, clamped at zero so a
/// reversal against a drifted flock cannot drive the sums negative.
async fn apply_flock_deltas(
    tx: &mut Transaction<'_, Postgres>,
    flock_id: &str,
    cost_delta: f64,
    feed_delta: f64,
) -> CluckResult<()> {
    sqlx::query(
        "UPDATE flocks SET
            total_cost = GREATEST(0, total_cost + $1),
            total_feed_consumed = GREATEST(0, total_feed_consumed + $2),
            updated_at = now()
         WHERE flock_id = $3",
    )
    .bind(cost_delta)
    .bind(feed_delta)
    .bind(flock_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

fn feed_quantity(category: &str, quantity: f64) -> f64 {
    if category == "Feed" {
        quantity
    } else {
        0.0
    }
}

/// Persists an expenditure and, when it is booked against a flock, applies
/// the cost/feed contribution in the same transaction.
pub async fn insert_expenditure(
    pool: &crate::db::DbPool,
    owner_id: i32,
    new: &NewExpenditure,
) -> CluckResult<Expenditure> {
    let mut tx = pool.begin().await?;

    if let Some(flock_id) = new.flock_id.as_deref() {
        lock_flock(&mut tx, owner_id, flock_id).await?;
        apply_flock_deltas(
            &mut tx,
            flock_id,
            new.amount,
            feed_quantity(&new.category, new.quantity),
        )
        .await?;
    }

    let expenditure_id = format!("E-{}", &uuid::Uuid::new_v4().to_string()[..8].to_uppercase());
    let row: Expenditure = sqlx::query_as(
        "INSERT INTO expenditures (expenditure_id, owner_id, category, quantity, unit_price, amount, description, expenditure_date, flock_id)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
         RETURNING *",
    )
    .bind(&expenditure_id)
    .bind(owner_id)
    .bind(&new.category)
    .bind(new.quantity)
    .bind(new.unit_price)
    .bind(new.amount)
    .bind(&new.description)
    .bind(new.expenditure_date)
    .bind(&new.flock_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(row)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenditureInput {
    pub category: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub description: Option<String>,
    pub expenditure_date: NaiveDate,
    pub flock_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateExpenditureInput {
    pub expenditure_id: String,
    pub category: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub description: Option<String>,
    pub expenditure_date: NaiveDate,
    pub flock_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteExpenditureInput {
    pub expenditure_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenditureQuery {
    pub flock_id: Option<String>,
}

fn normalize_flock_id(flock_id: Option<String>) -> Option<String> {
    flock_id.and_then(|f| {
        let trimmed = f.trim().to_string();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    })
}

impl ExpenditureInput {
    fn into_validated(self) -> CluckResult<NewExpenditure> {
        let flock_id = normalize_flock_id(self.flock_id);
        let amount = validate_expenditure_fields(
            &self.category,
            self.quantity,
            self.unit_price,
            flock_id.as_deref(),
        )
        .map_err(|(field, message)| CluckError::Validation(format!("{}: {}", field, message)))?;
        Ok(NewExpenditure {
            category: self.category,
            quantity: self.quantity,
            unit_price: self.unit_price,
            amount,
            description: self.description,
            expenditure_date: self.expenditure_date,
            flock_id,
        })
    }
}

pub async fn get_expenditures(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ExpenditureQuery>,
) -> CluckResult<Json<Vec<Expenditure>>> {
    let rows: Vec<Expenditure> = if let Some(flock_id) = query.flock_id {
        sqlx::query_as(
            "SELECT * FROM expenditures WHERE owner_id = $1 AND flock_id = $2 ORDER BY expenditure_date DESC, created_at DESC",
        )
        .bind(claims.user_id)
        .bind(flock_id)
        .fetch_all(&state.pool)
        .await?
    } else {
        sqlx::query_as(
            "SELECT * FROM expenditures WHERE owner_id = $1 ORDER BY expenditure_date DESC, created_at DESC",
        )
        .bind(claims.user_id)
        .fetch_all(&state.pool)
        .await?
    };
    Ok(Json(rows))
}

pub async fn create_expenditure(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(input): Json<ExpenditureInput>,
) -> CluckResult<Json<Expenditure>> {
    let new = input.into_validated()?;
    let row = insert_expenditure(&state.pool, claims.user_id, &new).await?;
    Ok(Json(row))
}

/// Same-flock edits apply only the amount/feed deltas; moving the
/// expenditure between flocks reverses the full old contribution and
/// applies the full new one.
pub async fn update_expenditure(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(input): Json<UpdateExpenditureInput>,
) -> CluckResult<Json<Expenditure>> {
    let expenditure_id = input.expenditure_id.clone();
    let new = ExpenditureInput {
        category: input.category,
        quantity: input.quantity,
        unit_price: input.unit_price,
        description: input.description,
        expenditure_date: input.expenditure_date,
        flock_id: input.flock_id,
    }
    .into_validated()?;

    let mut tx = state.pool.begin().await?;

    let old: Option<Expenditure> = sqlx::query_as(
        "SELECT * FROM expenditures WHERE expenditure_id = $1 AND owner_id = $2 FOR UPDATE",
    )
    .bind(&expenditure_id)
    .bind(claims.user_id)
    .fetch_optional(&mut *tx)
    .await?;
    let old = old.ok_or_else(|| {
        CluckError::Validation(format!("Expenditure {} not found", expenditure_id))
    })?;

    let old_feed = feed_quantity(&old.category, old.quantity);
    let new_feed = feed_quantity(&new.category, new.quantity);

    if old.flock_id == new.flock_id {
        if let Some(flock_id) = new.flock_id.as_deref() {
            lock_flock(&mut tx, claims.user_id, flock_id).await?;
            apply_flock_deltas(
                &mut tx,
                flock_id,
                new.amount - old.amount,
                new_feed - old_feed,
            )
            .await?;
        }
    } else {
        // Reverse against the old flock if it still exists.
        if let Some(old_flock_id) = old.flock_id.as_deref() {
            let exists: Option<(String,)> = sqlx::query_as(
                "SELECT flock_id FROM flocks WHERE flock_id = $1 AND owner_id = $2 FOR UPDATE",
            )
            .bind(old_flock_id)
            .bind(claims.user_id)
            .fetch_optional(&mut *tx)
            .await?;
            if exists.is_some() {
                apply_flock_deltas(&mut tx, old_flock_id, -old.amount, -old_feed).await?;
            }
        }
        if let Some(new_flock_id) = new.flock_id.as_deref() {
            lock_flock(&mut tx, claims.user_id, new_flock_id).await?;
            apply_flock_deltas(&mut tx, new_flock_id, new.amount, new_feed).await?;
        }
    }

    let row: Expenditure = sqlx::query_as(
        "UPDATE expenditures SET category = $1, quantity = $2, unit_price = $3, amount = $4, description = $5, expenditure_date = $6, flock_id = $7
         WHERE expenditure_id = $8
         RETURNING *",
    )
    .bind(&new.category)
    .bind(new.quantity)
    .bind(new.unit_price)
    .bind(new.amount)
    .bind(&new.description)
    .bind(new.expenditure_date)
    .bind(&new.flock_id)
    .bind(&expenditure_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(Json(row))
}

pub async fn delete_expenditure(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(input): Json<DeleteExpenditureInput>,
) -> CluckResult<Json<()>> {
    let mut tx = state.pool.begin().await?;

    let old: Option<Expenditure> = sqlx::query_as(
        "SELECT * FROM expenditures WHERE expenditure_id = $1 AND owner_id = $2 FOR UPDATE",
    )
    .bind(&input.expenditure_id)
    .bind(claims.user_id)
    .fetch_optional(&mut *tx)
    .await?;
    let old = old.ok_or_else(|| {
        CluckError::Validation(format!("Expenditure {} not found", input.expenditure_id))
    })?;

    if let Some(flock_id) = old.flock_id.as_deref() {
        let exists: Option<(String,)> = sqlx::query_as(
            "SELECT flock_id FROM flocks WHERE flock_id = $1 AND owner_id = $2 FOR UPDATE",
        )
        .bind(flock_id)
        .bind(claims.user_id)
        .fetch_optional(&mut *tx)
        .await?;
        if exists.is_some() {
            apply_flock_deltas(
                &mut tx,
                flock_id,
                -old.amount,
                -feed_quantity(&old.category, old.quantity),
            )
            .await?;
        }
    }

    sqlx::query("DELETE FROM expenditures WHERE expenditure_id = $1")
        .bind(&input.expenditure_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(Json(()))
}

// --- CSV import ---

#[derive(Debug, Deserialize)]
struct CsvExpenditureRow {
    category: String,
    quantity: f64,
    #[serde(rename = "unitPrice")]
    unit_price: f64,
    description: Option<String>,
    #[serde(rename = "expenditureDate")]
    expenditure_date: String,
    #[serde(rename = "flockId")]
    flock_id: Option<String>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RowError {
    pub row: usize,
    pub field: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub total_rows: usize,
    pub imported: usize,
    pub errors: Vec<RowError>,
}

fn csv_error_field(err: &csv::Error, headers: &csv::StringRecord) -> String {
    if let csv::ErrorKind::Deserialize { err: de, .. } = err.kind() {
        if let Some(idx) = de.field() {
            if let Some(name) = headers.get(idx as usize) {
                return name.to_string();
            }
        }
    }
    "row".to_string()
}

/// Parses and validates the CSV body row by row. Rows that fail keep their
/// 1-based row number, offending field and message; valid rows are returned
/// with their row number so a bad row never blocks its neighbors.
pub fn parse_import_rows(csv_text: &str) -> (Vec<(usize, NewExpenditure)>, Vec<RowError>) {
    let mut valid = Vec::new();
    let mut errors = Vec::new();

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(csv_text.as_bytes());
    let headers = reader
        .headers()
        .map(|h| h.clone())
        .unwrap_or_else(|_| csv::StringRecord::new());

    for (i, result) in reader.deserialize::<CsvExpenditureRow>().enumerate() {
        let row_number = i + 1;
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                errors.push(RowError {
                    row: row_number,
                    field: csv_error_field(&e, &headers),
                    message: e.to_string(),
                });
                continue;
            }
        };

        let flock_id = normalize_flock_id(record.flock_id);
        let amount = match validate_expenditure_fields(
            &record.category,
            record.quantity,
            record.unit_price,
            flock_id.as_deref(),
        ) {
            Ok(amount) => amount,
            Err((field, message)) => {
                errors.push(RowError {
                    row: row_number,
                    field,
                    message,
                });
                continue;
            }
        };

        let expenditure_date = match parse_expenditure_date(&record.expenditure_date) {
            Some(d) => d,
            None => {
                errors.push(RowError {
                    row: row_number,
                    field: "expenditureDate".into(),
                    message: format!("Invalid date '{}'", record.expenditure_date),
                });
                continue;
            }
        };

        valid.push((
            row_number,
            NewExpenditure {
                category: record.category,
                quantity: record.quantity,
                unit_price: record.unit_price,
                amount,
                description: record.description.filter(|d| !d.is_empty()),
                expenditure_date,
                flock_id,
            },
        ));
    }

    (valid, errors)
}

pub async fn import_expenditures(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    body: String,
) -> CluckResult<Json<ImportReport>> {
    let (rows, mut errors) = parse_import_rows(&body);
    let total_rows = rows.len() + errors.len();

    let mut imported = 0usize;
    for (row_number, row) in &rows {
        match insert_expenditure(&state.pool, claims.user_id, row).await {
            Ok(_) => imported += 1,
            Err(CluckError::Validation(message)) => {
                errors.push(RowError {
                    row: *row_number,
                    field: "flockId".into(),
                    message,
                });
            }
            Err(e) => return Err(e),
        }
    }

    errors.sort_by_key(|e| e.row);
    tracing::info!(
        "CSV import: {} rows, {} imported, {} rejected",
        total_rows,
        imported,
        errors.len()
    );

    Ok(Json(ImportReport {
        total_rows,
        imported,
        errors,
    }))
}

/// Downloadable template showing the expected import header and one
/// example row.
pub async fn import_template() -> impl IntoResponse {
    let body = format!(
        "{}\nFeed,50,1.25,Starter feed bags,2025-06-01,F-1A2B3C4D\n",
        CSV_HEADER
    );
    (
        [
            (header::CONTENT_TYPE, "text/csv"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"expenditures-template.csv\"",
            ),
        ],
        body,
    )
}
