// handlers/mod.rs - one module per resource, mounted under /api/v1
pub mod auth;
pub mod bootcamps;
pub mod courses;
pub mod reviews;
pub mod system;
pub mod users;

use axum::extract::rejection::JsonRejection;
use axum::Json;
use serde_json::{json, Value};

use crate::database::{parse_id, DatabaseError};
use crate::error::ApiError;
use crate::middleware::ApiResponse;
use crate::query::{Document, FilterPredicate, ID_FIELD};

/// JSON object body, with extractor rejections in the API error shape.
pub(crate) fn json_body(body: Result<Json<Document>, JsonRejection>) -> Result<Document, ApiError> {
    body.map(|Json(doc)| doc).map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}

/// Equality on the record id; malformed ids fail before reaching storage.
pub(crate) fn by_id(id: &str) -> Result<FilterPredicate, DatabaseError> {
    let id = parse_id(id)?;
    Ok(FilterPredicate::new().equals(ID_FIELD, id.to_string()))
}

pub(crate) fn str_field<'a>(doc: &'a Document, field: &str) -> Option<&'a str> {
    doc.get(field).and_then(Value::as_str)
}

/// `{success: true, data: {}}`, returned after deletes.
pub(crate) fn empty_data() -> ApiResponse<Value> {
    ApiResponse::success(json!({}))
}
