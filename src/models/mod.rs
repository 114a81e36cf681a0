pub mod bootcamp;
pub mod course;
pub mod review;
pub mod user;
pub mod validate;

use crate::query::Collection;

pub use bootcamp::BOOTCAMPS;
pub use course::COURSES;
pub use review::REVIEWS;
pub use user::{Role, USERS};

/// Every stored collection, for store construction and migrations.
pub static ALL: [&Collection; 4] = [&BOOTCAMPS, &COURSES, &REVIEWS, &USERS];
