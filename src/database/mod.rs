pub mod accessor;
pub mod error;
pub mod memory;
pub mod populate;
pub mod postgres;

pub use accessor::{now_rfc3339, parse_id, Collections, DataAccessor};
pub use error::DatabaseError;
pub use memory::MemoryStore;
pub use postgres::PgStore;
