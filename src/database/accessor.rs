use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use uuid::Uuid;

use super::error::DatabaseError;
use super::populate;
use crate::query::{Collection, Document, FilterPredicate, FindQuery, ID_FIELD};

pub const CREATED_AT_FIELD: &str = "createdAt";

/// Storage seam for every handler. Implementations own matching, ordering, windowing
/// and projection; relation expansion is layered on top by [`DataAccessor::execute`].
#[async_trait]
pub trait DataAccessor: Send + Sync {
    /// Number of records in `collection` matching `filter`, ignoring any window.
    async fn count_matching(&self, collection: &str, filter: &FilterPredicate) -> Result<u64, DatabaseError>;

    /// Runs the query without expanding relations.
    async fn fetch(&self, query: &FindQuery) -> Result<Vec<Document>, DatabaseError>;

    /// Inserts a record, assigning `_id` and `createdAt` when absent. Returns the stored record.
    async fn insert(&self, collection: &str, doc: Document) -> Result<Document, DatabaseError>;

    /// Merges `changes` into the record; a `null` value removes the field.
    async fn update(&self, collection: &str, id: &str, changes: Document) -> Result<Option<Document>, DatabaseError>;

    async fn delete(&self, collection: &str, id: &str) -> Result<Option<Document>, DatabaseError>;

    async fn delete_many(&self, collection: &str, filter: &FilterPredicate) -> Result<u64, DatabaseError>;

    async fn health_check(&self) -> Result<(), DatabaseError>;

    /// Runs the query and expands its relations.
    async fn execute(&self, query: &FindQuery) -> Result<Vec<Document>, DatabaseError> {
        let docs = self.fetch(query).await?;
        populate::resolve(self, docs, query.relations()).await
    }

    async fn find_one(&self, query: FindQuery) -> Result<Option<Document>, DatabaseError> {
        let mut docs = self.execute(&query.limit(1)).await?;
        Ok(docs.pop())
    }

    async fn find_by_id(&self, collection: &str, id: &str) -> Result<Option<Document>, DatabaseError> {
        let id = parse_id(id)?;
        self.find_one(FindQuery::find(collection, FilterPredicate::new().equals(ID_FIELD, id.to_string())))
            .await
    }
}

/// Record ids are UUIDs; anything else is a malformed id, not a missing record.
pub fn parse_id(id: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(id).map_err(|_| DatabaseError::InvalidId(id.to_string()))
}

pub fn id_of(doc: &Document) -> Option<&str> {
    doc.get(ID_FIELD).and_then(Value::as_str)
}

/// Fills in `_id` and `createdAt` for a new record.
pub fn prepare_insert(mut doc: Document) -> Result<Document, DatabaseError> {
    match doc.get(ID_FIELD) {
        None | Some(Value::Null) => {
            doc.insert(ID_FIELD.to_string(), Value::String(Uuid::new_v4().to_string()));
        }
        Some(Value::String(_)) => {}
        Some(other) => return Err(DatabaseError::InvalidId(other.to_string())),
    }
    if !doc.contains_key(CREATED_AT_FIELD) {
        doc.insert(CREATED_AT_FIELD.to_string(), Value::String(now_rfc3339()));
    }
    Ok(doc)
}

/// Applies an update: the id is fixed, `null` removes a field, anything else replaces it.
pub fn merge(mut doc: Document, changes: Document) -> Document {
    for (key, value) in changes {
        if key == ID_FIELD {
            continue;
        }
        if value.is_null() {
            doc.remove(&key);
        } else {
            doc.insert(key, value);
        }
    }
    doc
}

pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Collections a store knows about, for uniqueness and hidden-field handling.
#[derive(Debug, Clone, Default)]
pub struct Collections(HashMap<&'static str, &'static Collection>);

impl Collections {
    pub fn new(collections: &[&'static Collection]) -> Self {
        Collections(collections.iter().map(|c| (c.name, *c)).collect())
    }

    pub fn get(&self, name: &str) -> Option<&'static Collection> {
        self.0.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static Collection> + '_ {
        self.0.values().copied()
    }

    pub fn redact(&self, name: &str, doc: Document) -> Document {
        match self.get(name) {
            Some(collection) => collection.redact(doc),
            None => doc,
        }
    }
}
