//! HTTP surface: router construction and the health endpoint.

pub mod routes;

pub use routes::build_router;
