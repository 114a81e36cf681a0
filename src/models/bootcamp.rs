use serde_json::Value;

use super::validate::{is_valid_email, is_valid_url, slugify, writable, Violations};
use crate::database::DatabaseError;
use crate::query::{Collection, Document, FieldKind};

pub static BOOTCAMPS: Collection = Collection {
    name: "bootcamps",
    fields: &[
        ("_id", FieldKind::Id),
        ("name", FieldKind::String),
        ("slug", FieldKind::String),
        ("description", FieldKind::String),
        ("website", FieldKind::String),
        ("phone", FieldKind::String),
        ("email", FieldKind::String),
        ("address", FieldKind::String),
        ("location", FieldKind::GeoPoint),
        ("careers", FieldKind::StringArray),
        ("averageRating", FieldKind::Number),
        ("averageCost", FieldKind::Number),
        ("photo", FieldKind::String),
        ("housing", FieldKind::Boolean),
        ("jobAssistance", FieldKind::Boolean),
        ("jobGuarantee", FieldKind::Boolean),
        ("acceptGi", FieldKind::Boolean),
        ("user", FieldKind::Id),
        ("createdAt", FieldKind::Date),
    ],
    unique: &[&["name"]],
    hidden: &[],
};

pub const CAREERS: [&str; 6] = ["Web Development", "Mobile Development", "UI/UX", "Data Science", "Business", "Other"];

pub const DEFAULT_PHOTO: &str = "no-photo.jpg";

const WRITABLE: &[&str] = &[
    "name",
    "description",
    "website",
    "phone",
    "email",
    "address",
    "location",
    "careers",
    "housing",
    "jobAssistance",
    "jobGuarantee",
    "acceptGi",
];

const FLAGS: [&str; 4] = ["housing", "jobAssistance", "jobGuarantee", "acceptGi"];

/// New bootcamp owned by `user`, with defaults and slug applied.
pub fn build(body: Document, user: &str) -> Result<Document, DatabaseError> {
    let mut doc = writable(body, WRITABLE);
    for flag in FLAGS {
        doc.entry(flag).or_insert(Value::Bool(false));
    }
    doc.insert("photo".to_string(), Value::from(DEFAULT_PHOTO));
    doc.insert("user".to_string(), Value::from(user));
    refresh_slug(&mut doc);
    validate(&doc)?;
    Ok(doc)
}

/// Client changes to an existing bootcamp; `name` changes refresh the slug.
pub fn changes(body: Document) -> Document {
    let mut changes = writable(body, WRITABLE);
    refresh_slug(&mut changes);
    changes
}

fn refresh_slug(doc: &mut Document) {
    if let Some(name) = doc.get("name").and_then(Value::as_str) {
        let slug = slugify(name);
        doc.insert("slug".to_string(), Value::String(slug));
    }
}

pub fn validate(doc: &Document) -> Result<(), DatabaseError> {
    let mut v = Violations::new();

    let name = v.required_str(doc, "name", "Please add a name");
    v.max_len(name, 50, "Name can not be more than 50 characters");

    let description = v.required_str(doc, "description", "Please add a description");
    v.max_len(description, 500, "Description can not be more than 500 characters");

    if let Some(website) = v.optional_str(doc, "website") {
        if !is_valid_url(website) {
            v.push("Please use a valid URL with HTTP or HTTPS");
        }
    }

    let phone = v.optional_str(doc, "phone");
    v.max_len(phone, 20, "Phone number can not be longer than 20 characters");

    if let Some(email) = v.optional_str(doc, "email") {
        if !is_valid_email(email) {
            v.push("Please add a valid email");
        }
    }

    v.required_str(doc, "address", "Please add an address");

    match doc.get("careers") {
        Some(Value::Array(careers)) if !careers.is_empty() => {
            if careers.iter().any(|c| c.as_str().map_or(true, |c| !CAREERS.contains(&c))) {
                v.push(format!("Careers must be among: {}", CAREERS.join(", ")));
            }
        }
        _ => v.push("Please add at least one career"),
    }

    if let Some(location) = doc.get("location").filter(|l| !l.is_null()) {
        if !is_point(location) {
            v.push("Location must be a GeoJSON Point with [longitude, latitude]");
        }
    }

    let rating = v.optional_number(doc, "averageRating");
    v.range(rating, 1.0, 10.0, "Rating must be between 1 and 10");

    for flag in FLAGS {
        v.optional_bool(doc, flag);
    }

    v.into_result()
}

fn is_point(value: &Value) -> bool {
    let is_type = value.get("type").and_then(Value::as_str) == Some("Point");
    let coordinates = value.get("coordinates").and_then(Value::as_array);
    is_type
        && coordinates.is_some_and(|c| {
            c.len() == 2
                && c[0].as_f64().is_some_and(|lng| (-180.0..=180.0).contains(&lng))
                && c[1].as_f64().is_some_and(|lat| (-90.0..=90.0).contains(&lat))
        })
}
