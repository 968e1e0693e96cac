// Library exports for kinfeed
// This allows integration tests and the binary to share one module tree

pub mod auth;
pub mod config;
pub mod content;
pub mod db;
pub mod engagement;
pub mod error;
pub mod extractors;
pub mod notify;
pub mod routes;
pub mod state;
