use std::collections::BTreeMap;

use serde_json::Value;

use super::collection::Collection;
use super::error::QueryError;
use super::types::{
    validate_field_name, Condition, FilterOp, FilterPredicate, PaginationWindow, Projection, SortSpec,
    CONTROL_PARAMS,
};

/// Raw query-string pairs in arrival order, already percent-decoded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    pub fn parse(query: &str) -> Self {
        url::form_urlencoded::parse(query.as_bytes()).into_owned().collect()
    }

    /// First value supplied for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        QueryParams(iter.into_iter().collect())
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        QueryParams(iter.into_iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
    }
}

/// Everything the translator derives from the query string.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedQuery {
    pub filter: FilterPredicate,
    pub projection: Projection,
    pub sort: SortSpec,
    pub window: PaginationWindow,
}

impl ParsedQuery {
    pub fn from_params(params: &QueryParams, collection: &Collection, default_limit: u64) -> Result<Self, QueryError> {
        let filter = build_filter(params, collection)?;
        let projection = match params.get("select") {
            Some(select) => Projection::parse(select)?,
            None => Projection::All,
        };
        let sort = match params.get("sort") {
            Some(sort) => SortSpec::parse(sort)?,
            None => SortSpec::default(),
        };
        if let Some(key) = sort.keys().iter().find(|key| collection.is_hidden(&key.field)) {
            return Err(QueryError::InvalidField(key.field.clone()));
        }
        let window = PaginationWindow::from_params(params.get("page"), params.get("limit"), default_limit);
        Ok(Self { filter, projection, sort, window })
    }
}

/// Splits `averageCost[lte]` into (`averageCost`, Some(`lte`)); plain keys have no operator.
fn split_key(key: &str) -> (&str, Option<&str>) {
    match (key.find('['), key.strip_suffix(']')) {
        (Some(open), Some(head)) if open < head.len() => {
            (&key[..open], Some(&head[open + 1..]))
        }
        _ => (key, None),
    }
}

fn is_control(field: &str) -> bool {
    CONTROL_PARAMS.contains(&field)
}

/// Builds the filter predicate from every non-control parameter.
///
/// `field=value` is equality, `field[op]=value` is a comparison where `op` must be exactly
/// one of `gt`, `gte`, `lt`, `lte`, `in`. Values are never inspected for operator tokens.
pub fn build_filter(params: &QueryParams, collection: &Collection) -> Result<FilterPredicate, QueryError> {
    let mut filter = FilterPredicate::new();

    for (key, raw) in params.iter() {
        let (field, token) = split_key(key);
        if is_control(field) {
            continue;
        }
        validate_field_name(field)?;
        if collection.is_hidden(field) {
            return Err(QueryError::InvalidField(field.to_string()));
        }

        match token {
            Some(token) => {
                let op = FilterOp::from_token(token)
                    .ok_or_else(|| QueryError::UnsupportedOperator(token.to_string()))?;
                let value = match op {
                    FilterOp::In => Value::Array(coerce_list(collection, field, raw)?),
                    _ => collection.coerce(field, raw)?,
                };
                add_comparison(&mut filter, field, op, value)?;
            }
            None => {
                let value = collection.coerce(field, raw)?;
                add_equality(&mut filter, field, value)?;
            }
        }
    }

    Ok(filter)
}

fn coerce_list(collection: &Collection, field: &str, raw: &str) -> Result<Vec<Value>, QueryError> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| collection.coerce(field, item))
        .collect()
}

fn add_comparison(filter: &mut FilterPredicate, field: &str, op: FilterOp, value: Value) -> Result<(), QueryError> {
    match filter.get_mut(field) {
        None => {
            filter.insert(field.to_string(), Condition::Compare(BTreeMap::from([(op, value)])));
        }
        Some(Condition::Compare(ops)) => match (ops.get_mut(&op), value) {
            (Some(Value::Array(existing)), Value::Array(more)) => existing.extend(more),
            (_, value) => {
                ops.insert(op, value);
            }
        },
        Some(_) => return Err(QueryError::ConflictingConditions(field.to_string())),
    }
    Ok(())
}

/// A repeated plain key widens equality into a set membership test.
fn add_equality(filter: &mut FilterPredicate, field: &str, value: Value) -> Result<(), QueryError> {
    match filter.get_mut(field) {
        None => {
            filter.insert(field.to_string(), Condition::Equals(value));
        }
        Some(condition) => match condition {
            Condition::Equals(first) => {
                let first = first.take();
                *condition = Condition::Compare(BTreeMap::from([(FilterOp::In, Value::Array(vec![first, value]))]));
            }
            Condition::Compare(ops) if ops.len() == 1 => match ops.get_mut(&FilterOp::In) {
                Some(Value::Array(items)) => items.push(value),
                _ => return Err(QueryError::ConflictingConditions(field.to_string())),
            },
            _ => return Err(QueryError::ConflictingConditions(field.to_string())),
        },
    }
    Ok(())
}
