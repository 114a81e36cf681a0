use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::QueryError;

/// Query parameters that steer the translator and are never filter fields.
pub const CONTROL_PARAMS: [&str; 4] = ["select", "sort", "page", "limit"];

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_PAGE_SIZE: u64 = 25;
pub const DEFAULT_SORT_FIELD: &str = "createdAt";

/// Every record carries its id under this key.
pub const ID_FIELD: &str = "_id";

pub type Document = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FilterOp {
    #[serde(rename = "$gt")] Gt,
    #[serde(rename = "$gte")] Gte,
    #[serde(rename = "$lt")] Lt,
    #[serde(rename = "$lte")] Lte,
    #[serde(rename = "$in")] In,
}

impl FilterOp {
    /// Whole-token lookup: `gt` matches, `gt16` or `gtx` do not.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "gt" => Some(FilterOp::Gt),
            "gte" => Some(FilterOp::Gte),
            "lt" => Some(FilterOp::Lt),
            "lte" => Some(FilterOp::Lte),
            "in" => Some(FilterOp::In),
            _ => None,
        }
    }

    pub fn to_sql(&self) -> &'static str {
        match self {
            FilterOp::Gt => ">",
            FilterOp::Gte => ">=",
            FilterOp::Lt => "<",
            FilterOp::Lte => "<=",
            FilterOp::In => "IN",
        }
    }
}

/// Earth radius used to turn a distance in miles into radians.
pub const EARTH_RADIUS_MILES: f64 = 3963.0;

/// Centre point and radius (in radians) for a spherical radius lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoRadius {
    pub longitude: f64,
    pub latitude: f64,
    pub radius: f64,
}

impl GeoRadius {
    pub fn from_miles(longitude: f64, latitude: f64, miles: f64) -> Self {
        Self { longitude, latitude, radius: miles / EARTH_RADIUS_MILES }
    }

    /// Haversine central angle between the centre and a point, in radians.
    pub fn angle_to(&self, longitude: f64, latitude: f64) -> f64 {
        let (lat1, lat2) = (self.latitude.to_radians(), latitude.to_radians());
        let d_lat = (latitude - self.latitude).to_radians();
        let d_lng = (longitude - self.longitude).to_radians();
        let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
        2.0 * h.sqrt().asin()
    }

    pub fn contains(&self, longitude: f64, latitude: f64) -> bool {
        self.angle_to(longitude, latitude) <= self.radius
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Equals(Value),
    Compare(BTreeMap<FilterOp, Value>),
    Within(GeoRadius),
}

/// Which records match: every condition must hold.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterPredicate {
    conditions: BTreeMap<String, Condition>,
}

impl FilterPredicate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&Condition> {
        self.conditions.get(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Condition)> {
        self.conditions.iter()
    }

    pub fn equals(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.insert(field.into(), Condition::Equals(value.into()));
        self
    }

    pub fn compare(mut self, field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        let field = field.into();
        let value = value.into();
        match self.conditions.get_mut(&field) {
            Some(Condition::Compare(ops)) => {
                ops.insert(op, value);
            }
            _ => {
                self.conditions.insert(field, Condition::Compare(BTreeMap::from([(op, value)])));
            }
        }
        self
    }

    pub fn within(mut self, field: impl Into<String>, radius: GeoRadius) -> Self {
        self.conditions.insert(field.into(), Condition::Within(radius));
        self
    }

    pub(crate) fn insert(&mut self, field: String, condition: Condition) {
        self.conditions.insert(field, condition);
    }

    pub(crate) fn get_mut(&mut self, field: &str) -> Option<&mut Condition> {
        self.conditions.get_mut(field)
    }
}

/// Fields to return per record.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Projection {
    #[default]
    All,
    Fields(Vec<String>),
}

impl Projection {
    /// `"name,description"` → `Fields([name, description])`. Empty segments are skipped.
    /// Only top-level fields can be selected; dotted paths are rejected.
    pub fn parse(spec: &str) -> Result<Self, QueryError> {
        let mut fields = Vec::new();
        for part in spec.split(',') {
            let field = part.trim();
            if field.is_empty() {
                continue;
            }
            validate_field_name(field)?;
            if field.contains('.') {
                return Err(QueryError::InvalidField(field.to_string()));
            }
            if !fields.iter().any(|f| f == field) {
                fields.push(field.to_string());
            }
        }
        if fields.is_empty() {
            Ok(Projection::All)
        } else {
            Ok(Projection::Fields(fields))
        }
    }

    pub fn fields(names: &[&str]) -> Self {
        Projection::Fields(names.iter().map(|s| s.to_string()).collect())
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Projection::All)
    }

    /// Adds a field to an explicit projection; no-op for `All`.
    pub fn with_field(self, field: &str) -> Self {
        match self {
            Projection::All => Projection::All,
            Projection::Fields(mut fields) => {
                if !fields.iter().any(|f| f == field) {
                    fields.push(field.to_string());
                }
                Projection::Fields(fields)
            }
        }
    }

    /// Keeps the id plus the projected top-level fields that are present.
    pub fn apply(&self, doc: Document) -> Document {
        match self {
            Projection::All => doc,
            Projection::Fields(fields) => doc
                .into_iter()
                .filter(|(key, _)| key == ID_FIELD || fields.iter().any(|f| f == key))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    /// Missing fields sort before present ones when ascending.
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC NULLS FIRST",
            SortDirection::Desc => "DESC NULLS LAST",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortSpec(Vec<SortKey>);

impl SortSpec {
    pub fn none() -> Self {
        SortSpec(vec![])
    }

    /// `"-rating,name"` → rating descending, then name ascending.
    pub fn parse(spec: &str) -> Result<Self, QueryError> {
        let mut keys = Vec::new();
        for part in spec.split(',') {
            let trimmed = part.trim();
            if trimmed.is_empty() {
                continue;
            }
            let (field, direction) = match trimmed.strip_prefix('-') {
                Some(rest) => (rest, SortDirection::Desc),
                None => (trimmed.strip_prefix('+').unwrap_or(trimmed), SortDirection::Asc),
            };
            validate_field_name(field)?;
            keys.push(SortKey { field: field.to_string(), direction });
        }
        if keys.is_empty() {
            return Ok(Self::default());
        }
        Ok(SortSpec(keys))
    }

    pub fn keys(&self) -> &[SortKey] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for SortSpec {
    fn default() -> Self {
        SortSpec(vec![SortKey {
            field: DEFAULT_SORT_FIELD.to_string(),
            direction: SortDirection::Desc,
        }])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationWindow {
    pub page: u64,
    pub limit: u64,
}

impl PaginationWindow {
    pub fn new(page: u64, limit: u64) -> Self {
        Self { page: page.max(1), limit: limit.max(1) }
    }

    /// Lenient parse: leading digits count, anything else (or zero) falls back to the defaults.
    pub fn from_params(page: Option<&str>, limit: Option<&str>, default_limit: u64) -> Self {
        let page = page.and_then(parse_positive).unwrap_or(DEFAULT_PAGE);
        let limit = limit.and_then(parse_positive).unwrap_or(default_limit);
        Self::new(page, limit)
    }

    pub fn skip(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    pub fn take(&self) -> u64 {
        self.limit
    }

    pub fn has_next(&self, total: u64) -> bool {
        self.skip().saturating_add(self.limit) < total
    }

    pub fn has_prev(&self) -> bool {
        self.skip() > 0
    }
}

impl Default for PaginationWindow {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE, DEFAULT_PAGE_SIZE)
    }
}

fn parse_positive(raw: &str) -> Option<u64> {
    let digits: String = raw.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse::<u64>().ok().filter(|n| *n > 0)
}

#[derive(Debug, Clone, PartialEq)]
pub enum RelationKind {
    /// The record's `path` field holds the id of one related record.
    BelongsTo,
    /// Related records point back at this record through `foreign_field`.
    HasMany { foreign_field: String },
}

/// Relation to embed into each returned record.
#[derive(Debug, Clone, PartialEq)]
pub struct Populate {
    pub path: String,
    pub collection: String,
    pub kind: RelationKind,
    pub select: Projection,
}

impl Populate {
    pub fn belongs_to(path: &str, collection: &str) -> Self {
        Self {
            path: path.to_string(),
            collection: collection.to_string(),
            kind: RelationKind::BelongsTo,
            select: Projection::All,
        }
    }

    pub fn has_many(path: &str, collection: &str, foreign_field: &str) -> Self {
        Self {
            path: path.to_string(),
            collection: collection.to_string(),
            kind: RelationKind::HasMany { foreign_field: foreign_field.to_string() },
            select: Projection::All,
        }
    }

    pub fn select(mut self, fields: &[&str]) -> Self {
        self.select = Projection::fields(fields);
        self
    }
}

/// Field and collection names must look like identifiers; dots separate nested paths.
pub fn validate_field_name(name: &str) -> Result<(), QueryError> {
    let valid = !name.is_empty()
        && name.split('.').all(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) if first.is_ascii_alphabetic() || first == '_' => {
                    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
                }
                _ => false,
            }
        });
    if valid {
        Ok(())
    } else {
        Err(QueryError::InvalidField(name.to_string()))
    }
}
