//! HTTP presentation layer: DTOs, handlers, and router assembly.

pub mod controllers;
pub mod models;
pub mod routes;

pub use controllers::AppState;
pub use routes::create_router;
