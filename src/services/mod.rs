pub mod aggregate_service;

pub use aggregate_service::{refresh_average_cost, refresh_average_rating};
