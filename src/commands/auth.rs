use axum::{
    extract::{Extension, Json, State},
    response::IntoResponse,
};
use bcrypt::{hash, verify, DEFAULT_COST};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::db::User;
use crate::error::{CluckError, CluckResult};
use crate::middleware::auth::{issue_token, Claims};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub user_id: i32,
    pub email: String,
    pub display_name: Option<String>,
}

pub async fn ping() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> CluckResult<Json<LoginResponse>> {
    let email = payload.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(CluckError::Validation("A valid email is required".into()));
    }
    if payload.password.len() < 6 {
        return Err(CluckError::Validation(
            "Password must be at least 6 characters".into(),
        ));
    }

    let existing: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE email = $1")
        .bind(&email)
        .fetch_one(&state.pool)
        .await?;
    if existing.0 > 0 {
        return Err(CluckError::Validation(
            "An account with this email already exists".into(),
        ));
    }

    let password_hash = hash(&payload.password, DEFAULT_COST)?;

    let mut tx = state.pool.begin().await?;
    let (user_id,): (i32,) = sqlx::query_as(
        "INSERT INTO users (email, password_hash, display_name) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(&email)
    .bind(&password_hash)
    .bind(&payload.display_name)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO user_profiles (owner_id, display_name) VALUES ($1, $2)
         ON CONFLICT (owner_id) DO NOTHING",
    )
    .bind(user_id)
    .bind(&payload.display_name)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    let token = issue_token(user_id, &email)?;
    Ok(Json(LoginResponse {
        token,
        user_id,
        email,
        display_name: payload.display_name,
    }))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> CluckResult<Json<LoginResponse>> {
    let email = payload.email.trim().to_lowercase();
    if email.is_empty() || payload.password.trim().is_empty() {
        return Err(CluckError::Validation(
            "Email and password are required".into(),
        ));
    }

    let user: Option<User> = sqlx::query_as(
        "SELECT id, email, password_hash, display_name, created_at FROM users WHERE email = $1",
    )
    .bind(&email)
    .fetch_optional(&state.pool)
    .await?;

    let user = user.ok_or_else(|| CluckError::Auth("Invalid email or password".into()))?;

    if !verify(&payload.password, &user.password_hash)? {
        return Err(CluckError::Auth("Invalid email or password".into()));
    }

    let token = issue_token(user.id, &user.email)?;
    Ok(Json(LoginResponse {
        token,
        user_id: user.id,
        email: user.email,
        display_name: user.display_name,
    }))
}

pub async fn check_auth(Extension(claims): Extension<Claims>) -> impl IntoResponse {
    Json(json!({
        "userId": claims.user_id,
        "email": claims.email,
    }))
}
