use axum::{
    extract::{rejection::JsonRejection, Extension, Path, State},
    Json,
};
use serde_json::Value;

use super::{by_id, empty_data, json_body};
use crate::database::accessor::merge;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, ListResponse};
use crate::models::bootcamp::{self, BOOTCAMPS};
use crate::models::{COURSES, REVIEWS};
use crate::query::{AdvancedResults, Document, FilterPredicate, FindQuery, GeoRadius, Populate};
use crate::state::AppState;

/// Courses embedded in every bootcamp list entry.
pub fn courses_relation() -> Populate {
    Populate::has_many("courses", COURSES.name, "bootcamp")
}

fn not_found(id: &str) -> ApiError {
    ApiError::not_found(format!("Bootcamp not found with id of {}", id))
}

pub(crate) async fn load(state: &AppState, id: &str) -> Result<Document, ApiError> {
    state
        .db
        .find_one(FindQuery::find(BOOTCAMPS.name, by_id(id)?))
        .await?
        .ok_or_else(|| not_found(id))
}

/// GET /api/v1/bootcamps - Paginated, filtered bootcamps with their courses
pub async fn list(Extension(results): Extension<AdvancedResults>) -> Json<AdvancedResults> {
    Json(results)
}

/// GET /api/v1/bootcamps/:id
pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Document> {
    Ok(ApiResponse::success(load(&state, &id).await?))
}

/// POST /api/v1/bootcamps - Publishers own at most one bootcamp; admins any number
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    body: Result<Json<Document>, JsonRejection>,
) -> ApiResult<Document> {
    let body = json_body(body)?;

    if !user.is_admin() {
        let published = state
            .db
            .count_matching(BOOTCAMPS.name, &FilterPredicate::new().equals("user", user.id.as_str()))
            .await?;
        if published > 0 {
            return Err(ApiError::bad_request(format!(
                "The user with ID {} has already published a bootcamp",
                user.id
            )));
        }
    }

    let doc = bootcamp::build(body, &user.id)?;
    let created = state.db.insert(BOOTCAMPS.name, doc).await?;
    tracing::info!("Bootcamp {} created by {}", created.get("_id").unwrap_or(&serde_json::Value::Null), user.id);
    Ok(ApiResponse::created(created))
}

/// PUT /api/v1/bootcamps/:id - Owner or admin
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    body: Result<Json<Document>, JsonRejection>,
) -> ApiResult<Document> {
    let body = json_body(body)?;
    let existing = load(&state, &id).await?;
    user.ensure_owner(&existing, "update this bootcamp")?;

    let changes = bootcamp::changes(body);
    bootcamp::validate(&merge(existing, changes.clone()))?;

    let updated = state.db.update(BOOTCAMPS.name, &id, changes).await?.ok_or_else(|| not_found(&id))?;
    Ok(ApiResponse::success(updated))
}

/// DELETE /api/v1/bootcamps/:id - Owner or admin; removes the bootcamp's courses and reviews too
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    let existing = load(&state, &id).await?;
    user.ensure_owner(&existing, "delete this bootcamp")?;

    let children = FilterPredicate::new().equals("bootcamp", id.as_str());
    let courses = state.db.delete_many(COURSES.name, &children).await?;
    let reviews = state.db.delete_many(REVIEWS.name, &children).await?;
    state.db.delete(BOOTCAMPS.name, &id).await?;

    tracing::info!("Bootcamp {} deleted with {} courses and {} reviews", id, courses, reviews);
    Ok(empty_data())
}

/// GET /api/v1/bootcamps/radius/:lat/:lng/:distance - Bootcamps within `distance` miles
pub async fn within_radius(
    State(state): State<AppState>,
    Path((lat, lng, distance)): Path<(String, String, String)>,
) -> Result<ListResponse<Document>, ApiError> {
    let parse = |name: &str, raw: &str| {
        raw.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| ApiError::bad_request(format!("Invalid {}: {}", name, raw)))
    };
    let (lat, lng, distance) = (parse("latitude", &lat)?, parse("longitude", &lng)?, parse("distance", &distance)?);
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) || distance < 0.0 {
        return Err(ApiError::bad_request("Coordinates or distance out of range"));
    }

    let filter = FilterPredicate::new().within("location", GeoRadius::from_miles(lng, lat, distance));
    let bootcamps = state.db.execute(&FindQuery::find(BOOTCAMPS.name, filter)).await?;
    Ok(ListResponse::new(bootcamps))
}
