use axum::{
    extract::{rejection::JsonRejection, Extension, Path, State},
    Json,
};
use serde_json::Value;

use super::{bootcamps, by_id, empty_data, json_body, str_field};
use crate::database::accessor::merge;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, ListResponse};
use crate::models::review::{self, REVIEWS};
use crate::query::{AdvancedResults, Document, FilterPredicate, FindQuery};
use crate::services::aggregate_service::refresh_average_rating;
use crate::state::AppState;

use super::courses::bootcamp_relation;

fn not_found(id: &str) -> ApiError {
    ApiError::not_found(format!("No review found with the id of {}", id))
}

async fn load(state: &AppState, id: &str) -> Result<Document, ApiError> {
    state
        .db
        .find_one(FindQuery::find(REVIEWS.name, by_id(id)?))
        .await?
        .ok_or_else(|| not_found(id))
}

/// GET /api/v1/reviews - Paginated, filtered reviews
pub async fn list(Extension(results): Extension<AdvancedResults>) -> Json<AdvancedResults> {
    Json(results)
}

/// GET /api/v1/bootcamps/:id/reviews - Every review of one bootcamp
pub async fn list_for_bootcamp(
    State(state): State<AppState>,
    Path(bootcamp_id): Path<String>,
) -> Result<ListResponse<Document>, ApiError> {
    bootcamps::load(&state, &bootcamp_id).await?;
    let query = FindQuery::find(REVIEWS.name, FilterPredicate::new().equals("bootcamp", bootcamp_id.as_str()));
    Ok(ListResponse::new(state.db.execute(&query).await?))
}

/// GET /api/v1/reviews/:id
pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Document> {
    let query = FindQuery::find(REVIEWS.name, by_id(&id)?).populate(bootcamp_relation());
    let review = state.db.find_one(query).await?.ok_or_else(|| not_found(&id))?;
    Ok(ApiResponse::success(review))
}

/// POST /api/v1/bootcamps/:id/reviews - One review per user per bootcamp
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(bootcamp_id): Path<String>,
    body: Result<Json<Document>, JsonRejection>,
) -> ApiResult<Document> {
    let body = json_body(body)?;
    bootcamps::load(&state, &bootcamp_id).await?;

    let doc = review::build(body, &bootcamp_id, &user.id)?;
    let created = state.db.insert(REVIEWS.name, doc).await?;
    refresh_average_rating(state.db.as_ref(), &bootcamp_id).await?;
    Ok(ApiResponse::created(created))
}

/// PUT /api/v1/reviews/:id - Author or admin
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    body: Result<Json<Document>, JsonRejection>,
) -> ApiResult<Document> {
    let body = json_body(body)?;
    let existing = load(&state, &id).await?;
    user.ensure_owner(&existing, &format!("update review {}", id))?;

    let changes = review::changes(body);
    let bootcamp = str_field(&existing, "bootcamp").map(str::to_string);
    review::validate(&merge(existing, changes.clone()))?;

    let updated = state.db.update(REVIEWS.name, &id, changes).await?.ok_or_else(|| not_found(&id))?;
    if let Some(bootcamp) = bootcamp {
        refresh_average_rating(state.db.as_ref(), &bootcamp).await?;
    }
    Ok(ApiResponse::success(updated))
}

/// DELETE /api/v1/reviews/:id - Author or admin
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    let existing = load(&state, &id).await?;
    user.ensure_owner(&existing, &format!("delete review {}", id))?;

    state.db.delete(REVIEWS.name, &id).await?;
    if let Some(bootcamp) = str_field(&existing, "bootcamp") {
        refresh_average_rating(state.db.as_ref(), bootcamp).await?;
    }
    Ok(empty_data())
}
