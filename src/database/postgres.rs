use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres};
use tracing::info;

use super::accessor::{id_of, merge, parse_id, prepare_insert, Collections, DataAccessor};
use super::error::DatabaseError;
use crate::config::DatabaseConfig;
use crate::query::sql::{count_sql, create_table_sql, delete_sql, select_sql, table, SqlResult};
use crate::query::{Collection, Document, FilterPredicate, FindQuery};

const UNIQUE_VIOLATION: &str = "23505";

/// PostgreSQL accessor: one `(id UUID, doc JSONB)` table per collection.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    collections: Collections,
}

impl PgStore {
    pub async fn connect(config: &DatabaseConfig, collections: &[&'static Collection]) -> Result<Self, DatabaseError> {
        let url = config.url.as_deref().ok_or(DatabaseError::ConfigMissing("DATABASE_URL"))?;
        url::Url::parse(url).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(url)
            .await?;

        info!("Connected database pool ({} max connections)", config.max_connections);
        Ok(Self::from_pool(pool, collections))
    }

    pub fn from_pool(pool: PgPool, collections: &[&'static Collection]) -> Self {
        Self { pool, collections: Collections::new(collections) }
    }

    /// Creates collection tables and their unique indexes when missing.
    pub async fn migrate(&self) -> Result<(), DatabaseError> {
        for collection in self.collections.iter() {
            for statement in create_table_sql(collection)? {
                sqlx::query(&statement).execute(&self.pool).await?;
            }
            info!("Ensured table for collection: {}", collection.name);
        }
        Ok(())
    }

    fn redact(&self, query: &FindQuery, doc: Document) -> Document {
        if query.hidden_revealed() {
            doc
        } else {
            self.collections.redact(query.collection(), doc)
        }
    }
}

fn bind_all<'q>(
    mut query: sqlx::query::Query<'q, Postgres, PgArguments>,
    params: Vec<Value>,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    for param in params {
        query = query.bind(Json(param));
    }
    query
}

fn into_document(collection: &str, value: Value) -> Result<Document, DatabaseError> {
    match value {
        Value::Object(doc) => Ok(doc),
        _ => Err(DatabaseError::CorruptDocument { collection: collection.to_string() }),
    }
}

/// Unique index violations become `Duplicate`; everything else passes through.
fn map_write_error(err: sqlx::Error, collection: &str) -> DatabaseError {
    if let sqlx::Error::Database(db) = &err {
        if db.code().as_deref() == Some(UNIQUE_VIOLATION) {
            return DatabaseError::Duplicate(db.constraint().unwrap_or(collection).to_string());
        }
    }
    DatabaseError::Sqlx(err)
}

#[async_trait]
impl DataAccessor for PgStore {
    async fn count_matching(&self, collection: &str, filter: &FilterPredicate) -> Result<u64, DatabaseError> {
        let SqlResult { query, params } = count_sql(collection, filter)?;
        let mut statement = sqlx::query_scalar::<_, i64>(&query);
        for param in params {
            statement = statement.bind(Json(param));
        }
        let count = statement.fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }

    async fn fetch(&self, query: &FindQuery) -> Result<Vec<Document>, DatabaseError> {
        let SqlResult { query: sql, params } = select_sql(query)?;
        let mut statement = sqlx::query_scalar::<_, Json<Value>>(&sql);
        for param in params {
            statement = statement.bind(Json(param));
        }
        let rows = statement.fetch_all(&self.pool).await?;

        rows.into_iter()
            .map(|Json(value)| into_document(query.collection(), value).map(|doc| self.redact(query, doc)))
            .collect()
    }

    async fn insert(&self, collection: &str, doc: Document) -> Result<Document, DatabaseError> {
        let doc = prepare_insert(doc)?;
        let id = parse_id(id_of(&doc).unwrap_or_default())?;
        let sql = format!("INSERT INTO {} (id, doc) VALUES ($1, $2)", table(collection)?);
        sqlx::query(&sql)
            .bind(id)
            .bind(Json(Value::Object(doc.clone())))
            .execute(&self.pool)
            .await
            .map_err(|e| map_write_error(e, collection))?;
        Ok(self.collections.redact(collection, doc))
    }

    async fn update(&self, collection: &str, id: &str, changes: Document) -> Result<Option<Document>, DatabaseError> {
        let uuid = parse_id(id)?;
        let table = table(collection)?;
        let mut tx = self.pool.begin().await?;

        let current: Option<Json<Value>> =
            sqlx::query_scalar(&format!("SELECT doc FROM {} WHERE id = $1 FOR UPDATE", table))
                .bind(uuid)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(Json(current)) = current else {
            return Ok(None);
        };

        let updated = merge(into_document(collection, current)?, changes);
        sqlx::query(&format!("UPDATE {} SET doc = $2 WHERE id = $1", table))
            .bind(uuid)
            .bind(Json(Value::Object(updated.clone())))
            .execute(&mut *tx)
            .await
            .map_err(|e| map_write_error(e, collection))?;
        tx.commit().await?;

        Ok(Some(self.collections.redact(collection, updated)))
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<Option<Document>, DatabaseError> {
        let uuid = parse_id(id)?;
        let removed: Option<Json<Value>> =
            sqlx::query_scalar(&format!("DELETE FROM {} WHERE id = $1 RETURNING doc", table(collection)?))
                .bind(uuid)
                .fetch_optional(&self.pool)
                .await?;
        removed
            .map(|Json(value)| into_document(collection, value).map(|doc| self.collections.redact(collection, doc)))
            .transpose()
    }

    async fn delete_many(&self, collection: &str, filter: &FilterPredicate) -> Result<u64, DatabaseError> {
        let SqlResult { query, params } = delete_sql(collection, filter)?;
        let result = bind_all(sqlx::query(&query), params).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
