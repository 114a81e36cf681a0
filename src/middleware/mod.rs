pub mod advanced;
pub mod auth;
pub mod response;

pub use advanced::{advanced_results, AdvancedSource};
pub use auth::{authorize, protect, AuthUser};
pub use response::{ApiResponse, ApiResult, ListResponse};
