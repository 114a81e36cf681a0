use serde_json::{Map, Value};
use tracing::debug;

use crate::database::{DataAccessor, DatabaseError};
use crate::models::{BOOTCAMPS, COURSES, REVIEWS};
use crate::query::{FilterPredicate, FindQuery, Projection};

/// Mean tuition rounded up to the next multiple of ten.
pub fn average_cost(tuitions: &[f64]) -> Option<i64> {
    mean(tuitions).map(|m| ((m / 10.0).ceil() * 10.0) as i64)
}

pub fn average_rating(ratings: &[f64]) -> Option<f64> {
    mean(ratings)
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Recomputes `averageCost` for a bootcamp from its courses; removes it when none remain.
pub async fn refresh_average_cost(db: &dyn DataAccessor, bootcamp_id: &str) -> Result<(), DatabaseError> {
    let tuitions = numbers_of(db, COURSES.name, bootcamp_id, "tuition").await?;
    let value = average_cost(&tuitions).map(Value::from).unwrap_or(Value::Null);
    debug!(bootcamp = bootcamp_id, average_cost = %value, "refreshing average cost");
    store(db, bootcamp_id, "averageCost", value).await
}

/// Recomputes `averageRating` for a bootcamp from its reviews; removes it when none remain.
pub async fn refresh_average_rating(db: &dyn DataAccessor, bootcamp_id: &str) -> Result<(), DatabaseError> {
    let ratings = numbers_of(db, REVIEWS.name, bootcamp_id, "rating").await?;
    let value = average_rating(&ratings).map(Value::from).unwrap_or(Value::Null);
    debug!(bootcamp = bootcamp_id, average_rating = %value, "refreshing average rating");
    store(db, bootcamp_id, "averageRating", value).await
}

async fn numbers_of(db: &dyn DataAccessor, collection: &str, bootcamp_id: &str, field: &str) -> Result<Vec<f64>, DatabaseError> {
    let query = FindQuery::find(collection, FilterPredicate::new().equals("bootcamp", bootcamp_id))
        .select_fields(Projection::fields(&[field]));
    Ok(db
        .fetch(&query)
        .await?
        .iter()
        .filter_map(|doc| doc.get(field).and_then(Value::as_f64))
        .collect())
}

async fn store(db: &dyn DataAccessor, bootcamp_id: &str, field: &str, value: Value) -> Result<(), DatabaseError> {
    let mut changes = Map::new();
    changes.insert(field.to_string(), value);
    db.update(BOOTCAMPS.name, bootcamp_id, changes).await?;
    Ok(())
}
