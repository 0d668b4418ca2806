//! Shared library for cross-cutting concerns in the recipe platform Rust crates.
//!
//! This crate provides centralized implementations for:
//! - Error types for client construction
//! - HTTP client configuration and building, including private trust anchors
//! - Tracing subscriber initialisation

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod http;
pub mod tracing_config;

pub use error::PlatformError;
pub use http::{HttpConfig, build_http_client};
pub use tracing_config::{TracingConfig, init_tracing};
