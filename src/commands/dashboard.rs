use axum::extract::{Extension, Json, State};
use serde::Serialize;

use crate::db::DashboardTotals;
use crate::error::CluckResult;
use crate::metrics;
use crate::middleware::auth::Claims;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub flock_count: i64,
    pub total_birds: i64,
    pub total_initial_birds: i64,
    pub aggregate_mortality_rate: f64,
    pub total_eggs_collected: i64,
    pub total_revenue: f64,
    pub total_sales_count: i64,
    pub recent_sales_count: i64,
    pub total_expenditure: f64,
    pub net_balance: f64,
}

pub async fn get_dashboard_stats(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> CluckResult<Json<DashboardStats>> {
    let today = chrono::Local::now().date_naive();
    let recent_cutoff = today - chrono::Duration::days(30);

    let sql = r#"
        WITH flock_stats AS (
            SELECT
                COUNT(*) as flock_count,
                SUM(bird_count) as total_birds,
                SUM(initial_count) as total_initial_birds,
                SUM(total_eggs_collected) as total_eggs_collected
            FROM flocks WHERE owner_id = $1
        ),
        sales_stats AS (
            SELECT
                SUM(total_amount) as total_revenue,
                COUNT(*) as total_sales_count,
                COUNT(*) FILTER (WHERE sale_date >= $2) as recent_sales_count
            FROM sales WHERE owner_id = $1
        ),
        exp_stats AS (
            SELECT SUM(amount) as total_expenditure
            FROM expenditures WHERE owner_id = $1
        )
        SELECT
            CAST(fs.flock_count AS BIGINT) as flock_count,
            CAST(COALESCE(fs.total_birds, 0) AS BIGINT) as total_birds,
            CAST(COALESCE(fs.total_initial_birds, 0) AS BIGINT) as total_initial_birds,
            CAST(COALESCE(fs.total_eggs_collected, 0) AS BIGINT) as total_eggs_collected,
            COALESCE(ss.total_revenue, 0)::DOUBLE PRECISION as total_revenue,
            CAST(ss.total_sales_count AS BIGINT) as total_sales_count,
            CAST(ss.recent_sales_count AS BIGINT) as recent_sales_count,
            COALESCE(es.total_expenditure, 0)::DOUBLE PRECISION as total_expenditure
        FROM flock_stats fs, sales_stats ss, exp_stats es
    "#;

    let totals: DashboardTotals = sqlx::query_as(sql)
        .bind(claims.user_id)
        .bind(recent_cutoff)
        .fetch_one(&state.pool)
        .await
        .unwrap_or_default();

    // Mortality is computed from the summed counts, not averaged per flock,
    // so the headline number matches the metrics engine's aggregate form.
    let total_initial = totals.total_initial_birds.unwrap_or(0);
    let total_birds = totals.total_birds.unwrap_or(0);
    let aggregate_mortality_rate = metrics::aggregate_mortality_rate(&[(
        total_initial.min(i32::MAX as i64) as i32,
        total_birds.min(i32::MAX as i64) as i32,
    )]);

    let total_revenue = totals.total_revenue.unwrap_or(0.0);
    let total_expenditure = totals.total_expenditure.unwrap_or(0.0);

    Ok(Json(DashboardStats {
        flock_count: totals.flock_count.unwrap_or(0),
        total_birds,
        total_initial_birds: total_initial,
        aggregate_mortality_rate,
        total_eggs_collected: totals.total_eggs_collected.unwrap_or(0),
        total_revenue,
        total_sales_count: totals.total_sales_count.unwrap_or(0),
        recent_sales_count: totals.recent_sales_count.unwrap_or(0),
        total_expenditure,
        net_balance: total_revenue - total_expenditure,
    }))
}
