use axum::{
    extract::{Extension, Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use serde_json::Value;

use crate::auth::validate_jwt;
use crate::database::DatabaseError;
use crate::error::ApiError;
use crate::models::user::{role_of, Role, USERS};
use crate::query::Document;
use crate::state::AppState;

pub const TOKEN_COOKIE: &str = "token";

const NOT_AUTHORIZED: &str = "Not authorized to access this route";

/// Signed-in user, loaded fresh from storage for each request
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub id: String,
    pub role: Role,
    /// The user record without hidden fields.
    pub record: Document,
}

impl AuthUser {
    pub fn from_record(record: Document) -> Option<Self> {
        let id = record.get("_id").and_then(Value::as_str)?.to_string();
        Some(Self { id, role: role_of(&record), record })
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Owners and admins may change a record; anyone else gets a 403.
    pub fn ensure_owner(&self, record: &Document, action: &str) -> Result<(), ApiError> {
        let owner = record.get("user").and_then(Value::as_str);
        if self.is_admin() || owner == Some(self.id.as_str()) {
            Ok(())
        } else {
            Err(ApiError::forbidden(format!("User {} is not authorized to {}", self.id, action)))
        }
    }
}

/// Requires a valid token (Bearer header or `token` cookie) for an existing user
pub async fn protect(State(state): State<AppState>, mut request: Request, next: Next) -> Result<Response, ApiError> {
    let token = extract_token(request.headers()).ok_or_else(|| ApiError::unauthorized(NOT_AUTHORIZED))?;
    let claims = validate_jwt(&token, &state.config.security)?;

    let record = match state.db.find_by_id(USERS.name, &claims.id).await {
        Ok(Some(record)) => record,
        Ok(None) | Err(DatabaseError::InvalidId(_)) => {
            tracing::warn!("Token for unknown user {}", claims.id);
            return Err(ApiError::unauthorized(NOT_AUTHORIZED));
        }
        Err(e) => return Err(e.into()),
    };
    let user = AuthUser::from_record(record).ok_or_else(|| ApiError::unauthorized(NOT_AUTHORIZED))?;

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Lets only the given roles through; must run after [`protect`]
pub async fn authorize(
    State(roles): State<&'static [Role]>,
    Extension(user): Extension<AuthUser>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !roles.contains(&user.role) {
        return Err(ApiError::forbidden(format!(
            "User role {} is not authorized to access this route",
            user.role
        )));
    }
    Ok(next.run(request).await)
}

/// Extract the token from the Authorization header, falling back to the cookie
fn extract_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == TOKEN_COOKIE && !value.is_empty() && *value != "none")
        .map(|(_, value)| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use serde_json::json;

    #[test]
    fn bearer_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        headers.insert(header::COOKIE, HeaderValue::from_static("token=zzz"));
        assert_eq!(extract_token(&headers).as_deref(), Some("abc.def"));
    }

    #[test]
    fn cookie_fallback_and_cleared_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; token=xyz"));
        assert_eq!(extract_token(&headers).as_deref(), Some("xyz"));

        let mut cleared = HeaderMap::new();
        cleared.insert(header::COOKIE, HeaderValue::from_static("token=none"));
        assert_eq!(extract_token(&cleared), None);
        assert_eq!(extract_token(&HeaderMap::new()), None);
    }

    #[test]
    fn ownership_rules() {
        let record = |id: &str, role: &str| json!({"_id": id, "role": role}).as_object().cloned().unwrap();
        let owner = AuthUser::from_record(record("u1", "publisher")).unwrap();
        let stranger = AuthUser::from_record(record("u2", "publisher")).unwrap();
        let admin = AuthUser::from_record(record("u3", "admin")).unwrap();
        let camp = json!({"user": "u1"}).as_object().cloned().unwrap();

        assert!(owner.ensure_owner(&camp, "update this bootcamp").is_ok());
        assert!(admin.ensure_owner(&camp, "update this bootcamp").is_ok());
        let err = stranger.ensure_owner(&camp, "update this bootcamp").unwrap_err();
        assert_eq!(err.message(), "User u2 is not authorized to update this bootcamp");
    }
}
