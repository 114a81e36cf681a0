use std::collections::HashMap;

use serde_json::Value;

use super::accessor::{id_of, DataAccessor};
use super::error::DatabaseError;
use crate::query::{Document, FilterOp, FilterPredicate, FindQuery, Populate, RelationKind, ID_FIELD};

/// Expands each relation with one sub-query through the same accessor.
///
/// A belongs-to path whose target is gone becomes `null`; a has-many path is always an array.
pub async fn resolve<A>(accessor: &A, mut docs: Vec<Document>, relations: &[Populate]) -> Result<Vec<Document>, DatabaseError>
where
    A: DataAccessor + ?Sized,
{
    if docs.is_empty() {
        return Ok(docs);
    }

    for relation in relations {
        match &relation.kind {
            RelationKind::BelongsTo => {
                let ids = distinct(docs.iter().filter_map(|doc| doc.get(&relation.path).and_then(Value::as_str)));
                if ids.is_empty() {
                    continue;
                }
                let query = FindQuery::find(
                    relation.collection.as_str(),
                    FilterPredicate::new().compare(ID_FIELD, FilterOp::In, ids),
                )
                .select_fields(relation.select.clone());

                let by_id: HashMap<String, Document> = accessor
                    .fetch(&query)
                    .await?
                    .into_iter()
                    .filter_map(|related| id_of(&related).map(str::to_string).map(|id| (id, related)))
                    .collect();

                for doc in docs.iter_mut() {
                    let target = match doc.get(&relation.path).and_then(Value::as_str) {
                        Some(id) => by_id.get(id).cloned().map(Value::Object).unwrap_or(Value::Null),
                        None => continue,
                    };
                    doc.insert(relation.path.clone(), target);
                }
            }
            RelationKind::HasMany { foreign_field } => {
                let ids = distinct(docs.iter().filter_map(id_of));
                let query = FindQuery::find(
                    relation.collection.as_str(),
                    FilterPredicate::new().compare(foreign_field.as_str(), FilterOp::In, ids),
                )
                .select_fields(relation.select.clone().with_field(foreign_field));

                let mut grouped: HashMap<String, Vec<Value>> = HashMap::new();
                for related in accessor.fetch(&query).await? {
                    if let Some(owner) = related.get(foreign_field).and_then(Value::as_str).map(str::to_string) {
                        grouped.entry(owner).or_default().push(Value::Object(related));
                    }
                }

                for doc in docs.iter_mut() {
                    let children = id_of(doc).and_then(|id| grouped.remove(id)).unwrap_or_default();
                    doc.insert(relation.path.clone(), Value::Array(children));
                }
            }
        }
    }

    Ok(docs)
}

fn distinct<'a>(ids: impl Iterator<Item = &'a str>) -> Vec<Value> {
    let mut seen: Vec<&str> = Vec::new();
    for id in ids {
        if !seen.contains(&id) {
            seen.push(id);
        }
    }
    seen.into_iter().map(|id| Value::String(id.to_string())).collect()
}
