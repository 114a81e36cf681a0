use thiserror::Error;

use crate::query::QueryError;

/// Errors from the data accessors
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Invalid id: {0}")]
    InvalidId(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate value for {0}")]
    Duplicate(String),

    #[error("{}", .0.join(", "))]
    Validation(Vec<String>),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("Stored document in {collection} is not an object")]
    CorruptDocument { collection: String },

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl DatabaseError {
    pub fn validation(message: impl Into<String>) -> Self {
        DatabaseError::Validation(vec![message.into()])
    }
}
