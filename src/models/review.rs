use serde_json::Value;

use super::validate::{writable, Violations};
use crate::database::DatabaseError;
use crate::query::{Collection, Document, FieldKind};

pub static REVIEWS: Collection = Collection {
    name: "reviews",
    fields: &[
        ("_id", FieldKind::Id),
        ("title", FieldKind::String),
        ("text", FieldKind::String),
        ("rating", FieldKind::Number),
        ("bootcamp", FieldKind::Id),
        ("user", FieldKind::Id),
        ("createdAt", FieldKind::Date),
    ],
    // One review per user per bootcamp
    unique: &[&["bootcamp", "user"]],
    hidden: &[],
};

const WRITABLE: &[&str] = &["title", "text", "rating"];

pub fn build(body: Document, bootcamp: &str, user: &str) -> Result<Document, DatabaseError> {
    let mut doc = writable(body, WRITABLE);
    doc.insert("bootcamp".to_string(), Value::from(bootcamp));
    doc.insert("user".to_string(), Value::from(user));
    validate(&doc)?;
    Ok(doc)
}

pub fn changes(body: Document) -> Document {
    writable(body, WRITABLE)
}

pub fn validate(doc: &Document) -> Result<(), DatabaseError> {
    let mut v = Violations::new();
    let title = v.required_str(doc, "title", "Please add a title for the review");
    v.max_len(title, 100, "Title can not be more than 100 characters");
    v.required_str(doc, "text", "Please add some text");
    let rating = v.required_number(doc, "rating", "Please add a rating between 1 and 10");
    v.range(rating, 1.0, 10.0, "Please add a rating between 1 and 10");
    v.into_result()
}
