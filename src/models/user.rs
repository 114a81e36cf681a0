use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::validate::{is_valid_email, writable, Violations};
use crate::database::DatabaseError;
use crate::query::{Collection, Document, FieldKind};

pub static USERS: Collection = Collection {
    name: "users",
    fields: &[
        ("_id", FieldKind::Id),
        ("name", FieldKind::String),
        ("email", FieldKind::String),
        ("role", FieldKind::String),
        ("createdAt", FieldKind::Date),
    ],
    unique: &[&["email"]],
    hidden: &["password", "resetPasswordToken", "resetPasswordExpire"],
};

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Publisher,
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::User, Role::Publisher, Role::Admin];
    /// Roles a visitor may pick when registering.
    pub const SELF_ASSIGNABLE: [Role; 2] = [Role::User, Role::Publisher];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Publisher => "publisher",
            Role::Admin => "admin",
        }
    }

    pub fn parse(role: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.as_str() == role)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role stored on a user record; records without one are plain users.
pub fn role_of(doc: &Document) -> Role {
    doc.get("role").and_then(Value::as_str).and_then(Role::parse).unwrap_or(Role::User)
}

/// Validated user record without its password, plus the plaintext password to hash.
pub fn build(body: Document, roles: &[Role]) -> Result<(Document, String), DatabaseError> {
    let password = body.get("password").and_then(Value::as_str).unwrap_or_default().to_string();
    let mut doc = normalize_email(writable(body, &["name", "email", "role"]));
    doc.entry("role").or_insert(Value::from(Role::User.as_str()));

    let mut v = check_profile(&doc, roles);
    if password.is_empty() {
        v.push("Please add a password");
    } else if let Err(message) = check_password(&password) {
        v.push(message);
    }
    v.into_result()?;
    Ok((doc, password))
}

/// Profile fields a user may change about themselves.
pub fn detail_changes(body: Document) -> Document {
    normalize_email(writable(body, &["name", "email"]))
}

/// Profile fields an admin may change on any user.
pub fn admin_changes(body: Document) -> Document {
    normalize_email(writable(body, &["name", "email", "role"]))
}

fn normalize_email(mut doc: Document) -> Document {
    if let Some(Value::String(email)) = doc.get_mut("email") {
        *email = email.trim().to_lowercase();
    }
    doc
}

pub fn validate_profile(doc: &Document, roles: &[Role]) -> Result<(), DatabaseError> {
    check_profile(doc, roles).into_result()
}

fn check_profile(doc: &Document, roles: &[Role]) -> Violations {
    let mut v = Violations::new();
    v.required_str(doc, "name", "Please add a name");
    if let Some(email) = v.required_str(doc, "email", "Please add an email") {
        if !is_valid_email(email) {
            v.push("Please add a valid email");
        }
    }
    let allowed: Vec<&str> = roles.iter().map(Role::as_str).collect();
    let role = v.optional_str(doc, "role");
    v.one_of(role, &allowed, &format!("Role must be one of: {}", allowed.join(", ")));
    v
}

pub fn check_password(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(format!("Password must be at least {} characters", MIN_PASSWORD_LEN));
    }
    Ok(())
}
