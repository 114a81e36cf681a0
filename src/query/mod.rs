pub mod advanced;
pub mod collection;
pub mod error;
pub mod find;
pub mod params;
pub mod sql;
pub mod types;

pub use advanced::{advanced_results, AdvancedResults, PageLink, Pagination};
pub use collection::{Collection, FieldKind};
pub use error::QueryError;
pub use find::FindQuery;
pub use params::{ParsedQuery, QueryParams};
pub use types::*;
