//! Centralized error types for all Rust libraries.
//!
//! This module provides the error type returned when building the shared
//! HTTP client.

use std::path::PathBuf;
use thiserror::Error;

/// Common error type for platform operations.
#[derive(Error, Debug)]
pub enum PlatformError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A trust anchor file could not be read or parsed
    #[error("Invalid trust anchor {path}: {reason}")]
    TrustAnchor {
        /// Path of the offending file
        path: PathBuf,
        /// Why it was rejected
        reason: String,
    },
}

impl PlatformError {
    /// Create a trust anchor error for the given file.
    #[must_use]
    pub fn trust_anchor(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::TrustAnchor {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
