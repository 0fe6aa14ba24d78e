pub mod api;
pub mod cleanup;
mod error;
pub mod health;
pub mod public;

pub use api::api_routes;
pub use error::{ApiError, ErrorResponse};
