use axum::extract::{Extension, Json, State};
use chrono::NaiveDate;
use polars::prelude::*;
use serde::Deserialize;

use crate::error::CluckResult;
use crate::middleware::auth::Claims;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct MonthlyReportRequest {
    pub year: i32,
}

/// Monthly revenue/expense report. Sales and expenditures are folded into
/// one frame and bucketed by calendar month; the (year, month) group key
/// keeps ordering chronological even when the window crosses a year
/// boundary.
pub async fn get_monthly_report(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<MonthlyReportRequest>,
) -> CluckResult<Json<serde_json::Value>> {
    let sales_rows: Vec<(NaiveDate, f64)> = sqlx::query_as(
        "SELECT sale_date, total_amount FROM sales
         WHERE owner_id = $1 AND EXTRACT(YEAR FROM sale_date)::integer = $2",
    )
    .bind(claims.user_id)
    .bind(payload.year)
    .fetch_all(&state.pool)
    .await?;

    let exp_rows: Vec<(NaiveDate, f64)> = sqlx::query_as(
        "SELECT expenditure_date, amount FROM expenditures
         WHERE owner_id = $1 AND EXTRACT(YEAR FROM expenditure_date)::integer = $2",
    )
    .bind(claims.user_id)
    .bind(payload.year)
    .fetch_all(&state.pool)
    .await?;

    if sales_rows.is_empty() && exp_rows.is_empty() {
        return Ok(Json(serde_json::json!({
            "year": payload.year,
            "months": [],
            "summary": { "revenue": 0.0, "expenses": 0.0, "net": 0.0 }
        })));
    }

    let mut dates = Vec::with_capacity(sales_rows.len() + exp_rows.len());
    let mut revenues = Vec::with_capacity(dates.capacity());
    let mut expenses = Vec::with_capacity(dates.capacity());
    for (d, amount) in sales_rows {
        dates.push(d);
        revenues.push(amount);
        expenses.push(0.0);
    }
    for (d, amount) in exp_rows {
        dates.push(d);
        revenues.push(0.0);
        expenses.push(amount);
    }

    let df = df!(
        "entry_date" => dates,
        "revenue" => revenues,
        "expense" => expenses,
    )?;

    let monthly_df = df
        .clone()
        .lazy()
        .with_columns([
            col("entry_date").dt().year().alias("year"),
            col("entry_date").dt().month().alias("month"),
        ])
        .group_by([col("year"), col("month")])
        .agg([
            col("revenue").sum().alias("revenue"),
            col("expense").sum().alias("expense"),
            len().alias("record_count"),
        ])
        .sort(["year", "month"], SortMultipleOptions::default())
        .collect()?;

    let years = monthly_df.column("year")?.i32()?;
    let months = monthly_df.column("month")?.i8()?;
    let rev = monthly_df.column("revenue")?.f64()?;
    let exp = monthly_df.column("expense")?.f64()?;
    let counts = monthly_df.column("record_count")?.u32()?;

    let mut month_list = Vec::new();
    for i in 0..monthly_df.height() {
        let revenue = rev.get(i).unwrap_or(0.0);
        let expense = exp.get(i).unwrap_or(0.0);
        month_list.push(serde_json::json!({
            "month": crate::metrics::month_label(
                years.get(i).unwrap_or(0),
                months.get(i).unwrap_or(0) as u32,
            ),
            "revenue": revenue,
            "expenses": expense,
            "net": revenue - expense,
            "recordCount": counts.get(i),
        }));
    }

    let total_revenue: f64 = df.column("revenue")?.f64()?.sum().unwrap_or(0.0);
    let total_expenses: f64 = df.column("expense")?.f64()?.sum().unwrap_or(0.0);

    Ok(Json(serde_json::json!({
        "year": payload.year,
        "months": month_list,
        "summary": {
            "revenue": total_revenue,
            "expenses": total_expenses,
            "net": total_revenue - total_expenses,
        }
    })))
}

/// Compares each flock's stored running sums with what its ledger rows
/// actually add up to, and lists sales/expenditures whose flock no longer
/// exists. Read-only: this surfaces drift (out-of-band writes, data
/// predating the service), it does not repair it.
pub async fn get_reconciliation_report(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> CluckResult<Json<serde_json::Value>> {
    let drifted: Vec<(String, f64, f64, f64, f64)> = sqlx::query_as(
        r#"
        SELECT
            f.flock_id,
            f.total_cost,
            COALESCE(e.expected_cost, 0) as expected_cost,
            f.total_feed_consumed,
            COALESCE(e.expected_feed, 0) as expected_feed
        FROM flocks f
        LEFT JOIN (
            SELECT
                flock_id,
                SUM(amount) as expected_cost,
                SUM(quantity) FILTER (WHERE category = 'Feed') as expected_feed
            FROM expenditures
            WHERE owner_id = $1 AND flock_id IS NOT NULL
            GROUP BY flock_id
        ) e ON e.flock_id = f.flock_id
        WHERE f.owner_id = $1
          AND (ABS(f.total_cost - COALESCE(e.expected_cost, 0)) > 0.005
            OR ABS(f.total_feed_consumed - COALESCE(e.expected_feed, 0)) > 0.005)
        "#,
    )
    .bind(claims.user_id)
    .fetch_all(&state.pool)
    .await?;

    let orphaned_sales: Vec<(String, String)> = sqlx::query_as(
        "SELECT s.sale_id, s.flock_id FROM sales s
         LEFT JOIN flocks f ON f.flock_id = s.flock_id
         WHERE s.owner_id = $1 AND f.flock_id IS NULL",
    )
    .bind(claims.user_id)
    .fetch_all(&state.pool)
    .await?;

    let orphaned_expenditures: Vec<(String, String)> = sqlx::query_as(
        "SELECT e.expenditure_id, e.flock_id FROM expenditures e
         LEFT JOIN flocks f ON f.flock_id = e.flock_id
         WHERE e.owner_id = $1 AND e.flock_id IS NOT NULL AND f.flock_id IS NULL",
    )
    .bind(claims.user_id)
    .fetch_all(&state.pool)
    .await?;

    let drift_list: Vec<serde_json::Value> = drifted
        .into_iter()
        .map(|(flock_id, cost, expected_cost, feed, expected_feed)| {
            serde_json::json!({
                "flockId": flock_id,
                "storedCost": cost,
                "ledgerCost": expected_cost,
                "storedFeed": feed,
                "ledgerFeed": expected_feed,
            })
        })
        .collect();

    Ok(Json(serde_json::json!({
        "consistent": drift_list.is_empty()
            && orphaned_sales.is_empty()
            && orphaned_expenditures.is_empty(),
        "driftedFlocks": drift_list,
        "orphanedSales": orphaned_sales
            .into_iter()
            .map(|(sale_id, flock_id)| serde_json::json!({ "saleId": sale_id, "flockId": flock_id }))
            .collect::<Vec<_>>(),
        "orphanedExpenditures": orphaned_expenditures
            .into_iter()
            .map(|(expenditure_id, flock_id)| {
                serde_json::json!({ "expenditureId": expenditure_id, "flockId": flock_id })
            })
            .collect::<Vec<_>>(),
    })))
}
