use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::database::DatabaseError;
use crate::query::Document;

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9-]+(\.[a-zA-Z0-9-]+)*\.[a-zA-Z]{2,}$").expect("email regex")
});

static URL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://(www\.)?[-a-zA-Z0-9@:%._+~#=]{1,256}\.[a-zA-Z0-9()]{1,6}\b[-a-zA-Z0-9()@:%_+.~#?&/=]*$").expect("url regex"));

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_REGEX.is_match(email)
}

pub fn is_valid_url(url: &str) -> bool {
    URL_REGEX.is_match(url)
}

/// Collects every rule violation of a document before failing.
#[derive(Debug, Default)]
pub struct Violations(Vec<String>);

impl Violations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: impl Into<String>) {
        self.0.push(message.into());
    }

    /// Present, non-blank string; otherwise records `missing`.
    pub fn required_str<'a>(&mut self, doc: &'a Document, field: &str, missing: &str) -> Option<&'a str> {
        match doc.get(field) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.as_str()),
            Some(Value::String(_)) | None | Some(Value::Null) => {
                self.push(missing);
                None
            }
            Some(_) => {
                self.push(format!("{} must be text", field));
                None
            }
        }
    }

    pub fn optional_str<'a>(&mut self, doc: &'a Document, field: &str) -> Option<&'a str> {
        match doc.get(field) {
            Some(Value::String(s)) => Some(s.as_str()),
            None | Some(Value::Null) => None,
            Some(_) => {
                self.push(format!("{} must be text", field));
                None
            }
        }
    }

    pub fn required_number(&mut self, doc: &Document, field: &str, missing: &str) -> Option<f64> {
        match doc.get(field) {
            Some(Value::Number(n)) => n.as_f64(),
            None | Some(Value::Null) => {
                self.push(missing);
                None
            }
            Some(_) => {
                self.push(format!("{} must be a number", field));
                None
            }
        }
    }

    pub fn optional_number(&mut self, doc: &Document, field: &str) -> Option<f64> {
        match doc.get(field) {
            Some(Value::Number(n)) => n.as_f64(),
            None | Some(Value::Null) => None,
            Some(_) => {
                self.push(format!("{} must be a number", field));
                None
            }
        }
    }

    pub fn optional_bool(&mut self, doc: &Document, field: &str) {
        if !matches!(doc.get(field), None | Some(Value::Null) | Some(Value::Bool(_))) {
            self.push(format!("{} must be true or false", field));
        }
    }

    pub fn max_len(&mut self, value: Option<&str>, max: usize, message: &str) {
        if value.is_some_and(|v| v.chars().count() > max) {
            self.push(message);
        }
    }

    pub fn range(&mut self, value: Option<f64>, min: f64, max: f64, message: &str) {
        if value.is_some_and(|v| v < min || v > max) {
            self.push(message);
        }
    }

    pub fn one_of(&mut self, value: Option<&str>, allowed: &[&str], message: &str) {
        if value.is_some_and(|v| !allowed.contains(&v)) {
            self.push(message);
        }
    }

    pub fn into_result(self) -> Result<(), DatabaseError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(DatabaseError::Validation(self.0))
        }
    }
}

/// Keeps only the fields a client may write.
pub fn writable(body: Document, fields: &[&str]) -> Document {
    body.into_iter().filter(|(key, _)| fields.contains(&key.as_str())).collect()
}

/// Lowercase, dash-separated form of a name: `"Devworks Bootcamp!"` → `"devworks-bootcamp"`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if (c.is_whitespace() || c == '-' || c == '_') && !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}
