use axum::extract::{Extension, Json, State};
use serde::Deserialize;

use crate::db::UserProfile;
use crate::error::CluckResult;
use crate::middleware::auth::Claims;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileInput {
    pub display_name: Option<String>,
    pub farm_name: Option<String>,
    pub farm_location: Option<String>,
    pub farm_contact: Option<String>,
    pub currency: Option<String>,
}

pub async fn get_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> CluckResult<Json<UserProfile>> {
    let profile: Option<UserProfile> =
        sqlx::query_as("SELECT * FROM user_profiles WHERE owner_id = $1")
            .bind(claims.user_id)
            .fetch_optional(&state.pool)
            .await?;

    let profile = match profile {
        Some(p) => p,
        None => UserProfile {
            owner_id: claims.user_id,
            display_name: None,
            farm_name: None,
            farm_location: None,
            farm_contact: None,
            currency: "USD".to_string(),
            updated_at: None,
        },
    };

    Ok(Json(profile))
}

pub async fn save_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(input): Json<ProfileInput>,
) -> CluckResult<Json<UserProfile>> {
    let currency = input.currency.unwrap_or_else(|| "USD".to_string());

    let profile: UserProfile = sqlx::query_as(
        "INSERT INTO user_profiles (owner_id, display_name, farm_name, farm_location, farm_contact, currency, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, now())
         ON CONFLICT (owner_id) DO UPDATE SET
            display_name = EXCLUDED.display_name,
            farm_name = EXCLUDED.farm_name,
            farm_location = EXCLUDED.farm_location,
            farm_contact = EXCLUDED.farm_contact,
            currency = EXCLUDED.currency,
            updated_at = now()
         RETURNING *",
    )
    .bind(claims.user_id)
    .bind(&input.display_name)
    .bind(&input.farm_name)
    .bind(&input.farm_location)
    .bind(&input.farm_contact)
    .bind(&currency)
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(profile))
}
