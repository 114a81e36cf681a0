use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::accessor::{id_of, merge, parse_id, prepare_insert, Collections, DataAccessor};
use super::error::DatabaseError;
use crate::query::{
    Collection, Condition, Document, FilterOp, FilterPredicate, FindQuery, SortDirection, SortSpec,
};

/// In-process accessor. Records keep insertion order, which is the order of an unsorted read.
#[derive(Clone, Default)]
pub struct MemoryStore {
    records: Arc<RwLock<HashMap<String, Vec<Document>>>>,
    collections: Collections,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collections(collections: &[&'static Collection]) -> Self {
        Self { records: Arc::default(), collections: Collections::new(collections) }
    }

    fn check_unique(&self, collection: &str, existing: &[Document], candidate: &Document) -> Result<(), DatabaseError> {
        let Some(schema) = self.collections.get(collection) else {
            return Ok(());
        };
        let candidate_id = id_of(candidate);
        for fields in schema.unique {
            let values: Option<Vec<&Value>> =
                fields.iter().map(|f| candidate.get(*f).filter(|v| !v.is_null())).collect();
            let Some(values) = values else {
                continue;
            };
            let clash = existing.iter().any(|other| {
                id_of(other) != candidate_id
                    && fields.iter().zip(&values).all(|(f, v)| other.get(*f) == Some(*v))
            });
            if clash {
                return Err(DatabaseError::Duplicate(fields.join(", ")));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DataAccessor for MemoryStore {
    async fn count_matching(&self, collection: &str, filter: &FilterPredicate) -> Result<u64, DatabaseError> {
        let records = self.records.read().await;
        let count = records
            .get(collection)
            .map(|docs| docs.iter().filter(|doc| matches(doc, filter)).count())
            .unwrap_or(0);
        Ok(count as u64)
    }

    async fn fetch(&self, query: &FindQuery) -> Result<Vec<Document>, DatabaseError> {
        let mut found: Vec<Document> = {
            let records = self.records.read().await;
            match records.get(query.collection()) {
                Some(docs) => docs.iter().filter(|doc| matches(doc, query.filter())).cloned().collect(),
                None => return Ok(vec![]),
            }
        };

        sort_documents(&mut found, query.sort_spec());

        let skip = usize::try_from(query.skip_count()).unwrap_or(usize::MAX);
        let take = query.limit_count().map(|l| usize::try_from(l).unwrap_or(usize::MAX)).unwrap_or(usize::MAX);

        Ok(found
            .into_iter()
            .skip(skip)
            .take(take)
            .map(|doc| {
                let doc = if query.hidden_revealed() { doc } else { self.collections.redact(query.collection(), doc) };
                query.projection().apply(doc)
            })
            .collect())
    }

    async fn insert(&self, collection: &str, doc: Document) -> Result<Document, DatabaseError> {
        let doc = prepare_insert(doc)?;
        let mut records = self.records.write().await;
        let docs = records.entry(collection.to_string()).or_default();
        if docs.iter().any(|other| id_of(other) == id_of(&doc)) {
            return Err(DatabaseError::Duplicate("_id".to_string()));
        }
        self.check_unique(collection, docs, &doc)?;
        docs.push(doc.clone());
        Ok(self.collections.redact(collection, doc))
    }

    async fn update(&self, collection: &str, id: &str, changes: Document) -> Result<Option<Document>, DatabaseError> {
        parse_id(id)?;
        let mut records = self.records.write().await;
        let Some(docs) = records.get_mut(collection) else {
            return Ok(None);
        };
        let Some(index) = docs.iter().position(|doc| id_of(doc) == Some(id)) else {
            return Ok(None);
        };
        let updated = merge(docs[index].clone(), changes);
        self.check_unique(collection, docs, &updated)?;
        docs[index] = updated.clone();
        Ok(Some(self.collections.redact(collection, updated)))
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<Option<Document>, DatabaseError> {
        parse_id(id)?;
        let mut records = self.records.write().await;
        let removed = records.get_mut(collection).and_then(|docs| {
            docs.iter().position(|doc| id_of(doc) == Some(id)).map(|index| docs.remove(index))
        });
        Ok(removed.map(|doc| self.collections.redact(collection, doc)))
    }

    async fn delete_many(&self, collection: &str, filter: &FilterPredicate) -> Result<u64, DatabaseError> {
        let mut records = self.records.write().await;
        let Some(docs) = records.get_mut(collection) else {
            return Ok(0);
        };
        let before = docs.len();
        docs.retain(|doc| !matches(doc, filter));
        Ok((before - docs.len()) as u64)
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}

/// Resolves a dotted path inside a document.
fn lookup<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = doc.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn matches(doc: &Document, filter: &FilterPredicate) -> bool {
    filter.iter().all(|(field, condition)| condition_holds(lookup(doc, field), condition))
}

fn condition_holds(value: Option<&Value>, condition: &Condition) -> bool {
    match condition {
        Condition::Equals(expected) => equals_or_contains(value, expected),
        Condition::Compare(ops) => ops.iter().all(|(op, operand)| op_holds(value, *op, operand)),
        Condition::Within(radius) => value.and_then(point_of).map(|(lng, lat)| radius.contains(lng, lat)).unwrap_or(false),
    }
}

/// Equality on scalars, membership on arrays; `null` also matches a missing field.
fn equals_or_contains(value: Option<&Value>, expected: &Value) -> bool {
    match value {
        None => expected.is_null(),
        Some(Value::Array(items)) => items.iter().any(|item| same_value(item, expected)) || value == Some(expected),
        Some(actual) => same_value(actual, expected),
    }
}

/// JSON equality where `5` and `5.0` are the same number.
fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn op_holds(value: Option<&Value>, op: FilterOp, operand: &Value) -> bool {
    let Some(value) = value else {
        return false;
    };
    if op == FilterOp::In {
        return match operand {
            Value::Array(candidates) => candidates.iter().any(|c| equals_or_contains(Some(value), c)),
            single => equals_or_contains(Some(value), single),
        };
    }
    let candidates: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        scalar => vec![scalar],
    };
    candidates.into_iter().any(|candidate| match compare_scalars(candidate, operand) {
        Some(ordering) => match op {
            FilterOp::Gt => ordering == Ordering::Greater,
            FilterOp::Gte => ordering != Ordering::Less,
            FilterOp::Lt => ordering == Ordering::Less,
            FilterOp::Lte => ordering != Ordering::Greater,
            FilterOp::In => false,
        },
        None => false,
    })
}

/// Ordering between values of the same scalar type; mixed types never compare.
fn compare_scalars(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// `(lng, lat)` of a GeoJSON point.
fn point_of(value: &Value) -> Option<(f64, f64)> {
    let coordinates = value.get("coordinates")?.as_array()?;
    Some((coordinates.first()?.as_f64()?, coordinates.get(1)?.as_f64()?))
}

fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Number(_)) => 1,
        Some(Value::String(_)) => 2,
        Some(Value::Object(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Bool(_)) => 5,
    }
}

/// Total order used for sorting: missing and null first, then by type, then by value.
fn sort_order(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match type_rank(a).cmp(&type_rank(b)) {
        Ordering::Equal => match (a, b) {
            (Some(x), Some(y)) => compare_scalars(x, y).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        },
        unequal => unequal,
    }
}

fn sort_documents(docs: &mut [Document], sort: &SortSpec) {
    if sort.is_empty() {
        return;
    }
    // Stable, so ties keep insertion order
    docs.sort_by(|a, b| {
        for key in sort.keys() {
            let ordering = sort_order(lookup(a, &key.field), lookup(b, &key.field));
            let ordering = match key.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}
