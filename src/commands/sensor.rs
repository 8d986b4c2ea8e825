use axum::extract::{Extension, Json, State};
use chrono::{Local, Timelike};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::db::SensorReading;
use crate::error::{CluckError, CluckResult};
use crate::middleware::auth::Claims;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordReadingInput {
    pub temperature: f64,
    pub humidity: f64,
    pub ammonia_level: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestReading {
    pub temperature: f64,
    pub humidity: f64,
    pub ammonia_level: f64,
    pub recorded_at: String,
    pub simulated: bool,
}

/// Readings are append-only; history stays queryable while the dashboard
/// only ever shows the most recent row.
pub async fn record_reading(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(input): Json<RecordReadingInput>,
) -> CluckResult<Json<SensorReading>> {
    if !(0.0..=100.0).contains(&input.humidity) {
        return Err(CluckError::Validation(
            "Humidity must be between 0 and 100".into(),
        ));
    }

    let reading: SensorReading = sqlx::query_as(
        "INSERT INTO sensor_readings (owner_id, temperature, humidity, ammonia_level)
         VALUES ($1, $2, $3, $4)
         RETURNING *",
    )
    .bind(claims.user_id)
    .bind(input.temperature)
    .bind(input.humidity)
    .bind(input.ammonia_level)
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(reading))
}

pub async fn get_latest_reading(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> CluckResult<Json<LatestReading>> {
    let record: Option<SensorReading> = sqlx::query_as(
        "SELECT * FROM sensor_readings WHERE owner_id = $1 ORDER BY recorded_at DESC LIMIT 1",
    )
    .bind(claims.user_id)
    .fetch_optional(&state.pool)
    .await?;

    let reading = match record {
        Some(r) => LatestReading {
            temperature: r.temperature,
            humidity: r.humidity,
            ammonia_level: r.ammonia_level,
            recorded_at: r
                .recorded_at
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
            simulated: false,
        },
        None => simulated_reading(),
    };

    Ok(Json(reading))
}

/// Plausible barn conditions for farms without hardware sensors, following
/// a rough diurnal curve.
fn simulated_reading() -> LatestReading {
    let now = Local::now();
    let hour = now.hour();
    let mut rng = rand::rng();

    let base_temp = if (8..18).contains(&hour) {
        24.0 + (hour as f64 - 12.0).abs() * -0.5
    } else {
        18.0 + (rng.random_range(-10..10) as f64 / 10.0)
    };
    let temperature = base_temp + (rng.random_range(-5..5) as f64 / 10.0);
    let humidity = 60.0 + (rng.random_range(-100..100) as f64 / 10.0);
    let ammonia_level = if (8..18).contains(&hour) {
        8.0 + (rng.random_range(0..60) as f64 / 10.0)
    } else {
        12.0 + (rng.random_range(0..80) as f64 / 10.0)
    };

    LatestReading {
        temperature: (temperature * 10.0).round() / 10.0,
        humidity: (humidity * 10.0).round() / 10.0,
        ammonia_level: (ammonia_level * 10.0).round() / 10.0,
        recorded_at: now.format("%Y-%m-%d %H:%M:%S").to_string(),
        simulated: true,
    }
}
