use axum::{
    extract::{rejection::JsonRejection, Extension, Path, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::{json, Map, Value};

use super::{empty_data, json_body, str_field};
use crate::auth::{generate_jwt, hash_password, sha256_hex, verify_password, Claims, ResetToken};
use crate::config::AppConfig;
use crate::database::{accessor::merge, now_rfc3339};
use crate::error::ApiError;
use crate::middleware::auth::TOKEN_COOKIE;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::models::user::{self, check_password, Role, USERS};
use crate::query::{Document, FilterOp, FilterPredicate, FindQuery};
use crate::state::AppState;

const INVALID_CREDENTIALS: &str = "Invalid credentials";

/// `{success, token}` with the token mirrored into an HttpOnly cookie.
fn token_response(state: &AppState, user_id: &str) -> Result<Response, ApiError> {
    let security = &state.config.security;
    let token = generate_jwt(&Claims::new(user_id, security), security)?;
    let expires = Utc::now() + Duration::days(security.jwt_cookie_expiry_days as i64);
    let cookie = cookie(&token, expires, &state.config);
    Ok(([(header::SET_COOKIE, cookie)], Json(json!({ "success": true, "token": token }))).into_response())
}

fn cookie(value: &str, expires: DateTime<Utc>, config: &AppConfig) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; Expires={}",
        TOKEN_COOKIE,
        value,
        expires.format("%a, %d %b %Y %H:%M:%S GMT")
    );
    if config.security.secure_cookies {
        cookie.push_str("; Secure");
    }
    cookie
}

/// The stored record including its password hash and reset fields.
async fn find_with_secrets(state: &AppState, filter: FilterPredicate) -> Result<Option<Document>, ApiError> {
    Ok(state.db.find_one(FindQuery::find(USERS.name, filter).reveal_hidden()).await?)
}

fn hashed(state: &AppState, password: &str) -> Result<Value, ApiError> {
    Ok(Value::from(hash_password(password, &state.config.security)?))
}

/// POST /api/v1/auth/register
pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<Document>, JsonRejection>,
) -> Result<Response, ApiError> {
    let (mut doc, password) = user::build(json_body(body)?, &Role::SELF_ASSIGNABLE)?;
    doc.insert("password".to_string(), hashed(&state, &password)?);

    let created = state.db.insert(USERS.name, doc).await?;
    let id = str_field(&created, "_id").unwrap_or_default();
    tracing::info!("Registered user {}", id);
    token_response(&state, id)
}

/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<Document>, JsonRejection>,
) -> Result<Response, ApiError> {
    let body = json_body(body)?;
    let (email, password) = match (str_field(&body, "email"), str_field(&body, "password")) {
        (Some(email), Some(password)) if !email.is_empty() && !password.is_empty() => (email, password),
        _ => return Err(ApiError::bad_request("Please provide an email and password")),
    };

    let email = email.trim().to_lowercase();
    let record = find_with_secrets(&state, FilterPredicate::new().equals("email", email.as_str()))
        .await?
        .ok_or_else(|| ApiError::unauthorized(INVALID_CREDENTIALS))?;

    let hash = str_field(&record, "password").unwrap_or_default();
    if !verify_password(password, hash) {
        tracing::debug!("Failed login for {}", email);
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    }
    token_response(&state, str_field(&record, "_id").unwrap_or_default())
}

/// GET|POST /api/v1/auth/logout - Overwrites the cookie with a short-lived placeholder
pub async fn logout(State(state): State<AppState>) -> Response {
    let cookie = cookie("none", Utc::now() + Duration::seconds(10), &state.config);
    ([(header::SET_COOKIE, cookie)], empty_data()).into_response()
}

/// GET /api/v1/auth/me
pub async fn me(Extension(user): Extension<AuthUser>) -> ApiResult<Document> {
    Ok(ApiResponse::success(user.record))
}

/// PUT /api/v1/auth/updatedetails - Name and email only
pub async fn update_details(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    body: Result<Json<Document>, JsonRejection>,
) -> ApiResult<Document> {
    let changes = user::detail_changes(json_body(body)?);
    user::validate_profile(&merge(user.record, changes.clone()), &Role::ALL)?;

    let updated = state
        .db
        .update(USERS.name, &user.id, changes)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("No user with the id of {}", user.id)))?;
    Ok(ApiResponse::success(updated))
}

/// PUT /api/v1/auth/updatepassword
pub async fn update_password(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    body: Result<Json<Document>, JsonRejection>,
) -> Result<Response, ApiError> {
    let body = json_body(body)?;
    let current = str_field(&body, "currentPassword").unwrap_or_default();
    let new_password = str_field(&body, "newPassword").unwrap_or_default();

    let record = find_with_secrets(&state, FilterPredicate::new().equals("_id", user.id.as_str()))
        .await?
        .ok_or_else(|| ApiError::unauthorized("Not authorized to access this route"))?;
    if !verify_password(current, str_field(&record, "password").unwrap_or_default()) {
        return Err(ApiError::unauthorized("Password is incorrect"));
    }
    check_password(new_password).map_err(|message| ApiError::ValidationError(vec![message]))?;

    let mut changes = Map::new();
    changes.insert("password".to_string(), hashed(&state, new_password)?);
    state.db.update(USERS.name, &user.id, changes).await?;
    token_response(&state, &user.id)
}

/// POST /api/v1/auth/forgotpassword - Stores a hashed reset token; the link is logged, not mailed
pub async fn forgot_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<Document>, JsonRejection>,
) -> ApiResult<&'static str> {
    let body = json_body(body)?;
    let email = str_field(&body, "email").unwrap_or_default().trim().to_lowercase();
    let record = state
        .db
        .find_one(FindQuery::find(USERS.name, FilterPredicate::new().equals("email", email.as_str())))
        .await?
        .ok_or_else(|| ApiError::not_found("There is no user with that email"))?;
    let id = str_field(&record, "_id").unwrap_or_default();

    let reset = ResetToken::generate(&state.config.security);
    let mut changes = Map::new();
    changes.insert("resetPasswordToken".to_string(), Value::from(reset.hashed));
    changes.insert(
        "resetPasswordExpire".to_string(),
        Value::from(reset.expires.to_rfc3339_opts(SecondsFormat::Millis, true)),
    );
    state.db.update(USERS.name, id, changes).await?;

    let host = headers.get(header::HOST).and_then(|h| h.to_str().ok()).unwrap_or("localhost");
    let url = format!("http://{}/api/v1/auth/resetpassword/{}", host, reset.token);
    if state.config.is_production() {
        tracing::warn!("Password reset requested for {} but mail delivery is not configured", email);
    } else {
        tracing::info!("Password reset for {}: PUT {}", email, url);
    }
    Ok(ApiResponse::success("Email sent"))
}

/// PUT /api/v1/auth/resetpassword/:resettoken
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    body: Result<Json<Document>, JsonRejection>,
) -> Result<Response, ApiError> {
    let body = json_body(body)?;
    let filter = FilterPredicate::new()
        .equals("resetPasswordToken", sha256_hex(&token))
        .compare("resetPasswordExpire", FilterOp::Gt, now_rfc3339());
    let record = find_with_secrets(&state, filter)
        .await?
        .ok_or_else(|| ApiError::bad_request("Invalid token"))?;
    let id = str_field(&record, "_id").unwrap_or_default().to_string();

    let password = str_field(&body, "password").unwrap_or_default();
    check_password(password).map_err(|message| ApiError::ValidationError(vec![message]))?;

    let mut changes = Map::new();
    changes.insert("password".to_string(), hashed(&state, password)?);
    changes.insert("resetPasswordToken".to_string(), Value::Null);
    changes.insert("resetPasswordExpire".to_string(), Value::Null);
    state.db.update(USERS.name, &id, changes).await?;
    token_response(&state, &id)
}
