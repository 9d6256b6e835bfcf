//! HTTP server: router, error type, route handlers.

pub mod app;
pub mod error;
pub mod routes;

pub use app::build_app;
pub use error::ApiError;
