//! Derived-metrics engine. Pure functions over already-fetched flock and
//! ledger fields; no I/O, no mutation. Handlers and reports call into here
//! so every surface computes a given metric the same way.

use chrono::NaiveDate;
use serde::Serialize;

use crate::db::Flock;

pub const FLOCK_TYPE_BROILER: &str = "Broiler";
pub const FLOCK_TYPE_LAYER: &str = "Layer";

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Percentage of the initial count that has been lost. 0 when the flock
/// never had birds.
pub fn mortality_rate(initial_count: i32, bird_count: i32) -> f64 {
    if initial_count <= 0 {
        return 0.0;
    }
    (initial_count - bird_count) as f64 / initial_count as f64 * 100.0
}

/// Aggregate mortality across flocks: total lost over total initial,
/// as a percent rounded to 2 decimals. `0.00` when no birds were ever housed.
pub fn aggregate_mortality_rate(flocks: &[(i32, i32)]) -> f64 {
    let total_initial: i64 = flocks.iter().map(|(initial, _)| *initial as i64).sum();
    if total_initial <= 0 {
        return 0.0;
    }
    let total_lost: i64 = flocks
        .iter()
        .map(|(initial, count)| (*initial - *count) as i64)
        .sum();
    round2(total_lost as f64 / total_initial as f64 * 100.0)
}

/// Feed conversion ratio: feed mass consumed over live-weight gained.
/// Only meaningful for broilers; undefined when either term is zero.
pub fn feed_conversion_ratio(
    flock_type: &str,
    bird_count: i32,
    average_weight: f64,
    total_feed_consumed: f64,
) -> Option<f64> {
    if flock_type != FLOCK_TYPE_BROILER {
        return None;
    }
    let total_weight_gain = bird_count as f64 * average_weight;
    if total_feed_consumed <= 0.0 || total_weight_gain <= 0.0 {
        return None;
    }
    Some(total_feed_consumed / total_weight_gain)
}

pub fn cost_per_bird(total_cost: f64, bird_count: i32) -> Option<f64> {
    if bird_count <= 0 {
        return None;
    }
    Some(total_cost / bird_count as f64)
}

/// Whole weeks between hatch and `today`, floor division. Negative spans
/// (hatch date in the future) clamp to zero.
pub fn age_in_weeks(hatch_date: NaiveDate, today: NaiveDate) -> i64 {
    let days = (today - hatch_date).num_days();
    if days <= 0 {
        0
    } else {
        days / 7
    }
}

/// Cumulative eggs collected over the theoretical maximum
/// (one egg per bird per day over the flock's life), as a percent.
pub fn egg_production_rate(total_eggs_collected: i32, age_weeks: i64, bird_count: i32) -> f64 {
    let bird_days = age_weeks * 7 * bird_count as i64;
    if bird_days <= 0 {
        return 0.0;
    }
    total_eggs_collected as f64 / bird_days as f64 * 100.0
}

/// Unweighted arithmetic mean, skipping undefined entries. None when
/// nothing was defined.
pub fn mean_defined<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    let mut sum = 0.0;
    let mut n = 0usize;
    for v in values.into_iter().flatten() {
        sum += v;
        n += 1;
    }
    if n == 0 {
        None
    } else {
        Some(sum / n as f64)
    }
}

/// Calendar-month bucket key. Carrying the year keeps buckets that span a
/// year boundary in chronological order when sorted.
pub fn month_key(date: NaiveDate) -> (i32, u32) {
    use chrono::Datelike;
    (date.year(), date.month())
}

pub fn month_label(year: i32, month: u32) -> String {
    format!("{:04}-{:02}", year, month)
}

/// Per-flock derived metrics as served by the dashboard views.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlockMetrics {
    pub flock_id: String,
    pub breed: String,
    pub flock_type: String,
    pub bird_count: i32,
    pub mortality_rate: f64,
    pub feed_conversion_ratio: Option<f64>,
    pub cost_per_bird: Option<f64>,
    pub egg_production_rate: Option<f64>,
    pub age_in_weeks: i64,
}

impl FlockMetrics {
    pub fn compute(flock: &Flock, today: NaiveDate) -> Self {
        let age_weeks = age_in_weeks(flock.hatch_date, today);
        let eggs = if flock.flock_type == FLOCK_TYPE_LAYER {
            Some(egg_production_rate(
                flock.total_eggs_collected,
                age_weeks,
                flock.bird_count,
            ))
        } else {
            None
        };
        FlockMetrics {
            flock_id: flock.flock_id.clone(),
            breed: flock.breed.clone(),
            flock_type: flock.flock_type.clone(),
            bird_count: flock.bird_count,
            mortality_rate: round2(mortality_rate(flock.initial_count, flock.bird_count)),
            feed_conversion_ratio: feed_conversion_ratio(
                &flock.flock_type,
                flock.bird_count,
                flock.average_weight,
                flock.total_feed_consumed,
            )
            .map(round2),
            cost_per_bird: cost_per_bird(flock.total_cost, flock.bird_count).map(round2),
            egg_production_rate: eggs.map(round2),
            age_in_weeks: age_weeks,
        }
    }
}

/// Herd-level summary: aggregate mortality plus unweighted means of the
/// per-flock metrics (undefined values excluded, by design — a small flock
/// counts as much as a large one).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HerdSummary {
    pub flock_count: usize,
    pub total_birds: i64,
    pub aggregate_mortality_rate: f64,
    pub average_feed_conversion_ratio: Option<f64>,
    pub average_cost_per_bird: Option<f64>,
    pub average_egg_production_rate: Option<f64>,
}

impl HerdSummary {
    pub fn compute(metrics: &[FlockMetrics], flocks: &[Flock]) -> Self {
        let counts: Vec<(i32, i32)> = flocks
            .iter()
            .map(|f| (f.initial_count, f.bird_count))
            .collect();
        HerdSummary {
            flock_count: flocks.len(),
            total_birds: flocks.iter().map(|f| f.bird_count as i64).sum(),
            aggregate_mortality_rate: aggregate_mortality_rate(&counts),
            average_feed_conversion_ratio: mean_defined(
                metrics.iter().map(|m| m.feed_conversion_ratio),
            )
            .map(round2),
            average_cost_per_bird: mean_defined(metrics.iter().map(|m| m.cost_per_bird))
                .map(round2),
            average_egg_production_rate: mean_defined(
                metrics.iter().map(|m| m.egg_production_rate),
            )
            .map(round2),
        }
    }
}
