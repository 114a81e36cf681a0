use serde_json::Value;

use super::validate::{writable, Violations};
use crate::database::DatabaseError;
use crate::query::{Collection, Document, FieldKind};

pub static COURSES: Collection = Collection {
    name: "courses",
    fields: &[
        ("_id", FieldKind::Id),
        ("title", FieldKind::String),
        ("description", FieldKind::String),
        ("weeks", FieldKind::String),
        ("tuition", FieldKind::Number),
        ("minimumSkill", FieldKind::String),
        ("scholarshipAvailable", FieldKind::Boolean),
        ("bootcamp", FieldKind::Id),
        ("user", FieldKind::Id),
        ("createdAt", FieldKind::Date),
    ],
    unique: &[],
    hidden: &[],
};

pub const SKILLS: [&str; 3] = ["beginner", "intermediate", "advanced"];

const WRITABLE: &[&str] = &["title", "description", "weeks", "tuition", "minimumSkill", "scholarshipAvailable"];

pub fn build(body: Document, bootcamp: &str, user: &str) -> Result<Document, DatabaseError> {
    let mut doc = writable(body, WRITABLE);
    doc.entry("scholarshipAvailable").or_insert(Value::Bool(false));
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

    v.required_str(doc, "title", "Please add a course title");
    v.required_str(doc, "description", "Please add a description");

    match doc.get("weeks") {
        Some(Value::String(weeks)) if !weeks.trim().is_empty() => {}
        Some(Value::Number(_)) => {}
        _ => v.push("Please add number of weeks"),
    }

    let tuition = v.required_number(doc, "tuition", "Please add a tuition cost");
    if tuition.is_some_and(|t| t < 0.0) {
        v.push("Tuition can not be negative");
    }

    let skill = v.required_str(doc, "minimumSkill", "Please add a minimum skill");
    v.one_of(skill, &SKILLS, "Minimum skill must be beginner, intermediate or advanced");

    v.optional_bool(doc, "scholarshipAvailable");

    v.into_result()
}
