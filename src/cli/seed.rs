use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::Context;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::hash_password;
use crate::config::SecurityConfig;
use crate::database::accessor::id_of;
use crate::database::{parse_id, DataAccessor};
use crate::models::{self, validate::slugify, BOOTCAMPS, COURSES, REVIEWS, USERS};
use crate::query::{Document, FilterPredicate, ID_FIELD};
use crate::services::aggregate_service::{refresh_average_cost, refresh_average_rating};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub users: usize,
    pub bootcamps: usize,
    pub courses: usize,
    pub reviews: usize,
}

impl fmt::Display for ImportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} users, {} bootcamps, {} courses, {} reviews",
            self.users, self.bootcamps, self.courses, self.reviews
        )
    }
}

/// Seed files may carry ids from other stores; those are swapped for fresh UUIDs
/// and every reference to them follows.
#[derive(Default)]
struct IdMap(HashMap<String, String>);

impl IdMap {
    fn assign(&mut self, doc: &mut Document) {
        let Some(old) = id_of(doc).map(str::to_string) else { return };
        if parse_id(&old).is_ok() {
            return;
        }
        let new = Uuid::new_v4().to_string();
        doc.insert(ID_FIELD.to_string(), Value::from(new.as_str()));
        self.0.insert(old, new);
    }

    fn rewrite(&self, doc: &mut Document, field: &str) {
        if let Some(Value::String(reference)) = doc.get_mut(field) {
            if let Some(new) = self.0.get(reference.as_str()) {
                *reference = new.clone();
            }
        }
    }
}

fn read_records(dir: &Path, file: &str) -> anyhow::Result<Vec<Document>> {
    let path = dir.join(file);
    if !path.exists() {
        warn!("Skipping missing seed file {}", path.display());
        return Ok(vec![]);
    }
    let raw = fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

/// Loads `users.json`, `bootcamps.json`, `courses.json` and `reviews.json` from `dir`,
/// then recomputes every bootcamp's averages.
pub async fn import(db: &dyn DataAccessor, dir: &Path, security: &SecurityConfig) -> anyhow::Result<ImportSummary> {
    let mut users = read_records(dir, "users.json")?;
    let mut bootcamps = read_records(dir, "bootcamps.json")?;
    let mut courses = read_records(dir, "courses.json")?;
    let mut reviews = read_records(dir, "reviews.json")?;

    let mut ids = IdMap::default();
    for doc in users.iter_mut().chain(bootcamps.iter_mut()).chain(courses.iter_mut()).chain(reviews.iter_mut()) {
        ids.assign(doc);
    }

    let mut summary = ImportSummary::default();

    for mut user in users {
        if let Some(Value::String(password)) = user.get("password") {
            let hashed = hash_password(password, security)?;
            user.insert("password".to_string(), Value::from(hashed));
        }
        if let Some(Value::String(email)) = user.get_mut("email") {
            *email = email.trim().to_lowercase();
        }
        db.insert(USERS.name, user).await?;
        summary.users += 1;
    }

    let mut bootcamp_ids = Vec::with_capacity(bootcamps.len());
    for mut bootcamp in bootcamps {
        ids.rewrite(&mut bootcamp, "user");
        if !bootcamp.contains_key("slug") {
            if let Some(name) = bootcamp.get("name").and_then(Value::as_str) {
                let slug = slugify(name);
                bootcamp.insert("slug".to_string(), Value::from(slug));
            }
        }
        let stored = db.insert(BOOTCAMPS.name, bootcamp).await?;
        bootcamp_ids.extend(id_of(&stored).map(str::to_string));
        summary.bootcamps += 1;
    }

    for (collection, records, count) in [
        (COURSES.name, courses, &mut summary.courses),
        (REVIEWS.name, reviews, &mut summary.reviews),
    ] {
        for mut record in records {
            ids.rewrite(&mut record, "bootcamp");
            ids.rewrite(&mut record, "user");
            db.insert(collection, record).await?;
            *count += 1;
        }
    }

    for id in &bootcamp_ids {
        refresh_average_cost(db, id).await?;
        refresh_average_rating(db, id).await?;
    }

    info!("Imported {}", summary);
    Ok(summary)
}

/// Deletes every record of every collection; returns how many went.
pub async fn destroy(db: &dyn DataAccessor) -> anyhow::Result<u64> {
    let mut removed = 0;
    for collection in models::ALL {
        let count = db.delete_many(collection.name, &FilterPredicate::new()).await?;
        info!("Deleted {} records from {}", count, collection.name);
        removed += count;
    }
    Ok(removed)
}
