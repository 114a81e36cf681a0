use serde_json::Value;

use super::error::QueryError;
use super::types::{validate_field_name, Document};

/// How query-string values for a field are coerced before they reach the accessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Number,
    Boolean,
    Id,
    Date,
    StringArray,
    GeoPoint,
}

/// Static description of a stored collection.
#[derive(Debug)]
pub struct Collection {
    pub name: &'static str,
    pub fields: &'static [(&'static str, FieldKind)],
    /// Each entry is a set of fields whose combined values must be unique.
    pub unique: &'static [&'static [&'static str]],
    /// Never returned unless the query asks for them.
    pub hidden: &'static [&'static str],
}

impl Collection {
    pub const fn untyped(name: &'static str) -> Self {
        Self { name, fields: &[], unique: &[], hidden: &[] }
    }

    pub fn validate_name(name: &str) -> Result<(), QueryError> {
        if name.contains('.') || validate_field_name(name).is_err() {
            return Err(QueryError::InvalidCollection(name.to_string()));
        }
        Ok(())
    }

    /// Kind of the top-level field a (possibly dotted) path starts with.
    pub fn kind_of(&self, path: &str) -> Option<FieldKind> {
        let root = path.split('.').next().unwrap_or(path);
        self.fields.iter().find(|(name, _)| *name == root).map(|(_, kind)| *kind)
    }

    /// Turns a raw query-string value into a typed JSON value for `field`.
    pub fn coerce(&self, field: &str, raw: &str) -> Result<Value, QueryError> {
        let invalid = || QueryError::InvalidValue { field: field.to_string(), value: raw.to_string() };
        match self.kind_of(field) {
            Some(FieldKind::Number) => {
                let trimmed = raw.trim();
                if let Ok(i) = trimmed.parse::<i64>() {
                    return Ok(Value::from(i));
                }
                trimmed
                    .parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(Value::from)
                    .ok_or_else(invalid)
            }
            Some(FieldKind::Boolean) => match raw.trim() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(invalid()),
            },
            Some(FieldKind::Id) => uuid::Uuid::parse_str(raw.trim())
                .map(|id| Value::String(id.to_string()))
                .map_err(|_| invalid()),
            _ => Ok(Value::String(raw.to_string())),
        }
    }

    /// Whether a (possibly dotted) path falls under a hidden field.
    pub fn is_hidden(&self, path: &str) -> bool {
        let root = path.split('.').next().unwrap_or(path);
        self.hidden.contains(&root)
    }

    pub fn redact(&self, mut doc: Document) -> Document {
        for field in self.hidden {
            doc.remove(*field);
        }
        doc
    }
}
