use axum::{
    extract::{rejection::JsonRejection, Extension, Path, State},
    Json,
};
use serde_json::Value;

use super::{bootcamps, by_id, empty_data, json_body};
use crate::database::accessor::merge;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, ListResponse};
use crate::models::course::{self, COURSES};
use crate::models::BOOTCAMPS;
use crate::query::{AdvancedResults, Document, FilterPredicate, FindQuery, Populate};
use crate::services::aggregate_service::refresh_average_cost;
use crate::state::AppState;

/// Bootcamp summary embedded in course responses.
pub fn bootcamp_relation() -> Populate {
    Populate::belongs_to("bootcamp", BOOTCAMPS.name).select(&["name", "description"])
}

fn not_found(id: &str) -> ApiError {
    ApiError::not_found(format!("No course with the id of {}", id))
}

async fn load(state: &AppState, id: &str) -> Result<Document, ApiError> {
    state
        .db
        .find_one(FindQuery::find(COURSES.name, by_id(id)?))
        .await?
        .ok_or_else(|| not_found(id))
}

/// The bootcamp a course belongs to, whatever shape it was loaded in.
fn bootcamp_id(course: &Document) -> Option<String> {
    match course.get("bootcamp") {
        Some(Value::String(id)) => Some(id.clone()),
        Some(Value::Object(bootcamp)) => bootcamp.get("_id").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

/// GET /api/v1/courses - Paginated, filtered courses
pub async fn list(Extension(results): Extension<AdvancedResults>) -> Json<AdvancedResults> {
    Json(results)
}

/// GET /api/v1/bootcamps/:id/courses - Every course of one bootcamp
pub async fn list_for_bootcamp(
    State(state): State<AppState>,
    Path(bootcamp_id): Path<String>,
) -> Result<ListResponse<Document>, ApiError> {
    bootcamps::load(&state, &bootcamp_id).await?;
    let query = FindQuery::find(COURSES.name, FilterPredicate::new().equals("bootcamp", bootcamp_id.as_str()));
    Ok(ListResponse::new(state.db.execute(&query).await?))
}

/// GET /api/v1/courses/:id
pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Document> {
    let query = FindQuery::find(COURSES.name, by_id(&id)?).populate(bootcamp_relation());
    let course = state.db.find_one(query).await?.ok_or_else(|| not_found(&id))?;
    Ok(ApiResponse::success(course))
}

/// POST /api/v1/bootcamps/:id/courses - Bootcamp owner or admin
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(bootcamp_id): Path<String>,
    body: Result<Json<Document>, JsonRejection>,
) -> ApiResult<Document> {
    let body = json_body(body)?;
    let bootcamp = bootcamps::load(&state, &bootcamp_id).await?;
    user.ensure_owner(&bootcamp, &format!("add a course to bootcamp {}", bootcamp_id))?;

    let doc = course::build(body, &bootcamp_id, &user.id)?;
    let created = state.db.insert(COURSES.name, doc).await?;
    refresh_average_cost(state.db.as_ref(), &bootcamp_id).await?;
    Ok(ApiResponse::success(created))
}

/// PUT /api/v1/courses/:id - Course owner or admin
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    body: Result<Json<Document>, JsonRejection>,
) -> ApiResult<Document> {
    let body = json_body(body)?;
    let existing = load(&state, &id).await?;
    user.ensure_owner(&existing, &format!("update course {}", id))?;

    let changes = course::changes(body);
    let bootcamp = bootcamp_id(&existing);
    course::validate(&merge(existing, changes.clone()))?;

    let updated = state.db.update(COURSES.name, &id, changes).await?.ok_or_else(|| not_found(&id))?;
    if let Some(bootcamp) = bootcamp {
        refresh_average_cost(state.db.as_ref(), &bootcamp).await?;
    }
    Ok(ApiResponse::success(updated))
}

/// DELETE /api/v1/courses/:id - Course owner or admin
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    let existing = load(&state, &id).await?;
    user.ensure_owner(&existing, &format!("delete course {}", id))?;

    state.db.delete(COURSES.name, &id).await?;
    if let Some(bootcamp) = bootcamp_id(&existing) {
        refresh_average_cost(state.db.as_ref(), &bootcamp).await?;
    }
    Ok(empty_data())
}
