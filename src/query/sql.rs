use serde_json::Value;

use super::collection::Collection;
use super::error::QueryError;
use super::find::FindQuery;
use super::types::{validate_field_name, Condition, FilterOp, FilterPredicate, GeoRadius, Projection, SortSpec, ID_FIELD};

/// Parameterized statement for a `(id UUID, doc JSONB)` table. Every parameter is bound as JSONB.
#[derive(Debug, Clone)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<Value>,
}

/// Renders a field path as a JSONB expression on the `doc` column.
fn json_path(field: &str) -> Result<String, QueryError> {
    validate_field_name(field)?;
    if field.contains('.') {
        Ok(format!("doc #> '{{{}}}'", field.replace('.', ",")))
    } else {
        Ok(format!("doc -> '{}'", field))
    }
}

pub fn table(collection: &str) -> Result<String, QueryError> {
    Collection::validate_name(collection)?;
    Ok(format!("\"{}\"", collection))
}

pub struct SqlWhere {
    param_values: Vec<Value>,
}

impl SqlWhere {
    pub fn new() -> Self {
        Self { param_values: vec![] }
    }

    /// WHERE body (without the keyword) and its parameters; `TRUE` for an empty predicate.
    pub fn generate(filter: &FilterPredicate) -> Result<(String, Vec<Value>), QueryError> {
        let mut sql_where = Self::new();
        let clause = sql_where.build(filter)?;
        Ok((clause, sql_where.param_values))
    }

    fn build(&mut self, filter: &FilterPredicate) -> Result<String, QueryError> {
        let mut sql_conditions = vec![];
        for (field, condition) in filter.iter() {
            let path = json_path(field)?;
            sql_conditions.extend(self.build_condition(&path, condition));
        }
        if sql_conditions.is_empty() {
            Ok("TRUE".to_string())
        } else {
            Ok(sql_conditions.join(" AND "))
        }
    }

    fn build_condition(&mut self, path: &str, condition: &Condition) -> Vec<String> {
        match condition {
            Condition::Equals(Value::Null) => vec![format!("({} IS NULL OR {} = 'null'::jsonb)", path, path)],
            Condition::Equals(value) => {
                let p = self.param(value.clone());
                vec![Self::matches_value(path, &p)]
            }
            Condition::Compare(ops) => ops
                .iter()
                .map(|(op, value)| match op {
                    FilterOp::In => self.in_condition(path, value),
                    _ => {
                        let p = self.param(value.clone());
                        format!("{} {} {}", path, op.to_sql(), p)
                    }
                })
                .collect(),
            Condition::Within(radius) => vec![self.within_condition(path, radius)],
        }
    }

    /// Scalar equality, or membership when the stored value is an array.
    fn matches_value(path: &str, p: &str) -> String {
        format!(
            "({path} = {p} OR (jsonb_typeof({path}) = 'array' AND {path} @> jsonb_build_array({p})))",
            path = path,
            p = p
        )
    }

    fn in_condition(&mut self, path: &str, value: &Value) -> String {
        let values = match value {
            Value::Array(items) if items.is_empty() => return "FALSE".to_string(),
            Value::Array(_) => value.clone(),
            other => Value::Array(vec![other.clone()]),
        };
        let p = self.param(values);
        format!(
            "EXISTS (SELECT 1 FROM jsonb_array_elements({p}) AS candidate(value) WHERE {m})",
            p = p,
            m = Self::matches_value(path, "candidate.value")
        )
    }

    /// Haversine central angle between the stored GeoJSON point and the centre.
    fn within_condition(&mut self, path: &str, radius: &GeoRadius) -> String {
        let lng = format!("(({}) -> 'coordinates' ->> 0)::float8", path);
        let lat = format!("(({}) -> 'coordinates' ->> 1)::float8", path);
        let center_lng = format!("({})::float8", self.param(Value::from(radius.longitude)));
        let center_lat = format!("({})::float8", self.param(Value::from(radius.latitude)));
        let max = format!("({})::float8", self.param(Value::from(radius.radius)));
        format!(
            "(jsonb_typeof({path} -> 'coordinates') = 'array' AND 2 * asin(sqrt(power(sin(radians({lat} - {clat}) / 2), 2) + cos(radians({clat})) * cos(radians({lat})) * power(sin(radians({lng} - {clng}) / 2), 2))) <= {max})",
            path = path,
            lat = lat,
            lng = lng,
            clat = center_lat,
            clng = center_lng,
            max = max
        )
    }

    fn param(&mut self, value: Value) -> String {
        self.param_values.push(value);
        format!("${}", self.param_values.len())
    }
}

impl Default for SqlWhere {
    fn default() -> Self {
        Self::new()
    }
}

const MAX_ROWS: u64 = i64::MAX as u64;

pub struct SqlOrder;

impl SqlOrder {
    pub fn generate(sort: &SortSpec) -> Result<String, QueryError> {
        if sort.is_empty() {
            return Ok(String::new());
        }
        let parts = sort
            .keys()
            .iter()
            .map(|key| Ok(format!("{} {}", json_path(&key.field)?, key.direction.to_sql())))
            .collect::<Result<Vec<_>, QueryError>>()?;
        Ok(format!("ORDER BY {}", parts.join(", ")))
    }
}

/// Full SELECT for a find query. Relations are resolved separately.
pub fn select_sql(query: &FindQuery) -> Result<SqlResult, QueryError> {
    let table = table(query.collection())?;
    let (where_clause, mut params) = SqlWhere::generate(query.filter())?;

    let select_clause = match query.projection() {
        Projection::All => "doc".to_string(),
        Projection::Fields(fields) => {
            for field in fields {
                validate_field_name(field)?;
            }
            params.push(Value::from(fields.clone()));
            format!(
                "(SELECT COALESCE(jsonb_object_agg(e.key, e.value), '{{}}'::jsonb) FROM jsonb_each(doc) AS e WHERE e.key = '{}' OR ${} @> to_jsonb(e.key)) AS doc",
                ID_FIELD,
                params.len()
            )
        }
    };

    let order_clause = SqlOrder::generate(query.sort_spec())?;
    // LIMIT and OFFSET are bigint in PostgreSQL
    let limit = query.limit_count().map(|limit| limit.min(MAX_ROWS));
    let skip = query.skip_count().min(MAX_ROWS);
    let limit_clause = match (limit, skip) {
        (Some(limit), 0) => format!("LIMIT {}", limit),
        (Some(limit), skip) => format!("LIMIT {} OFFSET {}", limit, skip),
        (None, 0) => String::new(),
        (None, skip) => format!("OFFSET {}", skip),
    };

    let sql = [
        format!("SELECT {}", select_clause),
        format!("FROM {}", table),
        format!("WHERE {}", where_clause),
        order_clause,
        limit_clause,
    ]
    .into_iter()
    .filter(|s| !s.is_empty())
    .collect::<Vec<_>>()
    .join(" ");

    Ok(SqlResult { query: sql, params })
}

pub fn count_sql(collection: &str, filter: &FilterPredicate) -> Result<SqlResult, QueryError> {
    let table = table(collection)?;
    let (where_clause, params) = SqlWhere::generate(filter)?;
    Ok(SqlResult {
        query: format!("SELECT COUNT(*) AS count FROM {} WHERE {}", table, where_clause),
        params,
    })
}

pub fn delete_sql(collection: &str, filter: &FilterPredicate) -> Result<SqlResult, QueryError> {
    let table = table(collection)?;
    let (where_clause, params) = SqlWhere::generate(filter)?;
    Ok(SqlResult { query: format!("DELETE FROM {} WHERE {}", table, where_clause), params })
}

/// DDL for a collection table plus one unique expression index per unique key.
pub fn create_table_sql(collection: &Collection) -> Result<Vec<String>, QueryError> {
    let table = table(collection.name)?;
    let mut statements = vec![format!(
        "CREATE TABLE IF NOT EXISTS {} (id UUID PRIMARY KEY, doc JSONB NOT NULL)",
        table
    )];
    for fields in collection.unique {
        let exprs = fields
            .iter()
            .map(|f| json_path(f).map(|p| format!("({})", p.replace("->", "->>"))))
            .collect::<Result<Vec<_>, QueryError>>()?;
        statements.push(format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS \"{}_{}_key\" ON {} ({})",
            collection.name,
            fields.join("_"),
            table,
            exprs.join(", ")
        ));
    }
    Ok(statements)
}
