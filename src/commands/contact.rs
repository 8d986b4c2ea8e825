use axum::extract::{Extension, Json, State};
use serde::Deserialize;

use crate::db::Contact;
use crate::error::{CluckError, CluckResult};
use crate::middleware::auth::Claims;
use crate::state::AppState;

pub const CONTACT_TYPES: [&str; 2] = ["Supplier", "Buyer"];

fn validate_contact(name: &str, contact_type: &str) -> CluckResult<()> {
    if name.trim().is_empty() {
        return Err(CluckError::Validation("Contact name is required".into()));
    }
    if !CONTACT_TYPES.contains(&contact_type) {
        return Err(CluckError::Validation(format!(
            "Unknown contact type '{}' (expected Supplier or Buyer)",
            contact_type
        )));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactInput {
    pub name: String,
    pub contact_type: String,
    pub contact_person: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub products: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateContactInput {
    pub contact_id: String,
    #[serde(flatten)]
    pub fields: ContactInput,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteContactInput {
    pub contact_id: String,
}

pub async fn get_contacts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> CluckResult<Json<Vec<Contact>>> {
    let contacts: Vec<Contact> =
        sqlx::query_as("SELECT * FROM contacts WHERE owner_id = $1 ORDER BY name")
            .bind(claims.user_id)
            .fetch_all(&state.pool)
            .await?;
    Ok(Json(contacts))
}

pub async fn create_contact(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(input): Json<ContactInput>,
) -> CluckResult<Json<Contact>> {
    validate_contact(&input.name, &input.contact_type)?;

    let contact_id = format!("CT-{}", &uuid::Uuid::new_v4().to_string()[..8].to_uppercase());
    let contact: Contact = sqlx::query_as(
        "INSERT INTO contacts (contact_id, owner_id, name, contact_type, contact_person, email, phone, address, products)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
         RETURNING *",
    )
    .bind(&contact_id)
    .bind(claims.user_id)
    .bind(input.name.trim())
    .bind(&input.contact_type)
    .bind(&input.contact_person)
    .bind(&input.email)
    .bind(&input.phone)
    .bind(&input.address)
    .bind(&input.products)
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(contact))
}

pub async fn update_contact(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(input): Json<UpdateContactInput>,
) -> CluckResult<Json<Contact>> {
    validate_contact(&input.fields.name, &input.fields.contact_type)?;

    let contact: Option<Contact> = sqlx::query_as(
        "UPDATE contacts SET name = $1, contact_type = $2, contact_person = $3, email = $4, phone = $5, address = $6, products = $7
         WHERE contact_id = $8 AND owner_id = $9
         RETURNING *",
    )
    .bind(input.fields.name.trim())
    .bind(&input.fields.contact_type)
    .bind(&input.fields.contact_person)
    .bind(&input.fields.email)
    .bind(&input.fields.phone)
    .bind(&input.fields.address)
    .bind(&input.fields.products)
    .bind(&input.contact_id)
    .bind(claims.user_id)
    .fetch_optional(&state.pool)
    .await?;

    let contact = contact.ok_or_else(|| {
        CluckError::Validation(format!("Contact {} not found", input.contact_id))
    })?;
    Ok(Json(contact))
}

pub async fn delete_contact(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(input): Json<DeleteContactInput>,
) -> CluckResult<Json<()>> {
    let result = sqlx::query("DELETE FROM contacts WHERE contact_id = $1 AND owner_id = $2")
        .bind(&input.contact_id)
        .bind(claims.user_id)
        .execute(&state.pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(CluckError::Validation(format!(
            "Contact {} not found",
            input.contact_id
        )));
    }
    Ok(Json(()))
}
