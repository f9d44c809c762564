//! Shared infrastructure: HTTP client construction, logging, wire models.

pub mod http;
pub mod logging;
pub mod models;
