// Library exports for Postbook
// This allows integration tests and the binary to share one router

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod media;
pub mod routes;
pub mod serializers;
pub mod state;
pub mod store;
