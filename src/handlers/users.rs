use axum::{
    extract::{rejection::JsonRejection, Extension, Path, State},
    Json,
};
use serde_json::Value;

use super::{by_id, empty_data, json_body};
use crate::auth::hash_password;
use crate::database::accessor::merge;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::models::user::{self, Role, USERS};
use crate::query::{AdvancedResults, Document, FindQuery};
use crate::state::AppState;

fn not_found(id: &str) -> ApiError {
    ApiError::not_found(format!("No user with the id of {}", id))
}

async fn load(state: &AppState, id: &str) -> Result<Document, ApiError> {
    state
        .db
        .find_one(FindQuery::find(USERS.name, by_id(id)?))
        .await?
        .ok_or_else(|| not_found(id))
}

/// GET /api/v1/users
pub async fn list(Extension(results): Extension<AdvancedResults>) -> Json<AdvancedResults> {
    Json(results)
}

/// GET /api/v1/users/:id
pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Document> {
    Ok(ApiResponse::success(load(&state, &id).await?))
}

/// POST /api/v1/users - Admins may assign any role
pub async fn create(
    State(state): State<AppState>,
    body: Result<Json<Document>, JsonRejection>,
) -> ApiResult<Document> {
    let (mut doc, password) = user::build(json_body(body)?, &Role::ALL)?;
    doc.insert("password".to_string(), Value::from(hash_password(&password, &state.config.security)?));

    let created = state.db.insert(USERS.name, doc).await?;
    Ok(ApiResponse::created(created))
}

/// PUT /api/v1/users/:id - Name, email and role; passwords change through the auth routes
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<Document>, JsonRejection>,
) -> ApiResult<Document> {
    let changes = user::admin_changes(json_body(body)?);
    let existing = load(&state, &id).await?;
    user::validate_profile(&merge(existing, changes.clone()), &Role::ALL)?;

    let updated = state.db.update(USERS.name, &id, changes).await?.ok_or_else(|| not_found(&id))?;
    Ok(ApiResponse::success(updated))
}

/// DELETE /api/v1/users/:id
pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Value> {
    load(&state, &id).await?;
    state.db.delete(USERS.name, &id).await?;
    Ok(empty_data())
}
