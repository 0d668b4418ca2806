//! Error handling for the recipe service.
//!
//! Every failure inside a request becomes a [`RecipeError`]. At the HTTP
//! boundary it is turned into a fixed, safe message: causes are logged but
//! never echoed to the client.

use crate::{db::DbError, material::MaterialError};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use vault_pki_client::{ErrorKind, VaultError};

/// Request-scoped errors.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RecipeError {
    /// Path parameter is not a positive integer
    #[error("Invalid recipe id")]
    InvalidId,

    /// No row matches the identifier
    #[error("Recipe {id} not found")]
    NotFound {
        /// Requested identifier
        id: i32,
    },

    /// Vault address, token, trust anchor, mount or role missing or wrong
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Vault refused to certify the requested identity
    #[error("Authorization error: {0}")]
    Authorization(String),

    /// Vault could not be reached
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// Certificate issuance did not finish in time
    #[error("Certificate request timed out after {duration:?}")]
    Timeout {
        /// Bound that was exceeded
        duration: Duration,
    },

    /// Writing the material files failed
    #[error("Materialization failed: {0}")]
    Materialization(#[from] MaterialError),

    /// Network, TLS or authentication failure against the database
    #[error("Database connect failed: {cause}")]
    DatabaseConnect {
        /// Driver message, for logs only
        cause: String,
    },

    /// The lookup failed after connecting
    #[error("Query failed: {0}")]
    Query(String),

    /// More than one row shares the identifier
    #[error("Identifier matched {rows} rows")]
    Integrity {
        /// Rows returned
        rows: usize,
    },
}

/// Stable machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Identifier is not a positive integer
    InvalidId,
    /// No such recipe
    NotFound,
    /// Service setup is incomplete
    Configuration,
    /// Vault declined the identity
    Authorization,
    /// Vault unreachable or answering unexpectedly
    Connectivity,
    /// Issuance exceeded its bound
    Timeout,
    /// Material files could not be written
    Materialization,
    /// Database connect or handshake failed
    DatabaseConnect,
    /// Lookup failed
    Query,
    /// Duplicate identifiers
    Integrity,
}

impl ErrorCode {
    /// Get the string representation of the error code
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidId => "INVALID_RECIPE_ID",
            Self::NotFound => "RECIPE_NOT_FOUND",
            Self::Configuration => "CONFIGURATION_ERROR",
            Self::Authorization => "AUTHORIZATION_DENIED",
            Self::Connectivity => "ISSUER_UNAVAILABLE",
            Self::Timeout => "TIMEOUT",
            Self::Materialization => "MATERIALIZATION_FAILED",
            Self::DatabaseConnect => "DATABASE_CONNECT_FAILED",
            Self::Query => "QUERY_FAILED",
            Self::Integrity => "DATA_INTEGRITY",
        }
    }

    /// HTTP status for this code.
    ///
    /// Authorization denials stay 500: clients cannot act on them.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::InvalidId => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Fixed client-facing message.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::InvalidId => "Invalid recipe id",
            Self::NotFound => "Recipe not found",
            Self::Configuration => "Service is not configured",
            Self::Authorization => "Certificate request was denied",
            Self::Connectivity => "Certificate authority is unavailable",
            Self::Timeout => "Upstream request timed out",
            Self::Materialization => "Failed to prepare client credentials",
            Self::DatabaseConnect => "Database connection failed",
            Self::Query => "Database query failed",
            Self::Integrity => "Recipe data is inconsistent",
        }
    }
}

impl RecipeError {
    /// Get the error code for this error
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidId => ErrorCode::InvalidId,
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::Configuration(_) => ErrorCode::Configuration,
            Self::Authorization(_) => ErrorCode::Authorization,
            Self::Connectivity(_) => ErrorCode::Connectivity,
            Self::Timeout { .. } => ErrorCode::Timeout,
            Self::Materialization(_) => ErrorCode::Materialization,
            Self::DatabaseConnect { .. } => ErrorCode::DatabaseConnect,
            Self::Query(_) => ErrorCode::Query,
            Self::Integrity { .. } => ErrorCode::Integrity,
        }
    }
}

impl From<VaultError> for RecipeError {
    fn from(err: VaultError) -> Self {
        if let VaultError::Timeout(duration) = &err {
            return Self::Timeout {
                duration: *duration,
            };
        }
        match err.kind() {
            ErrorKind::Configuration => Self::Configuration(err.to_string()),
            ErrorKind::Authorization => Self::Authorization(err.to_string()),
            ErrorKind::Connectivity => Self::Connectivity(err.to_string()),
        }
    }
}

impl From<DbError> for RecipeError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Connect(cause) => Self::DatabaseConnect { cause },
            DbError::Query(msg) => Self::Query(msg),
            DbError::Integrity { rows } => Self::Integrity { rows },
        }
    }
}

/// JSON error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Safe, human-readable message
    pub error: String,
}

impl ErrorResponse {
    /// Build the client-facing body for `err`.
    #[must_use]
    pub fn from_error(err: &RecipeError) -> Self {
        Self {
            error: err.code().message().to_string(),
        }
    }
}

impl IntoResponse for RecipeError {
    fn into_response(self) -> Response {
        let code = self.code();
        let status = code.status();
        if status.is_server_error() {
            error!(code = code.as_str(), error = %self, "Request failed");
        } else {
            info!(code = code.as_str(), error = %self, "Request rejected");
        }
        (status, Json(ErrorResponse::from_error(&self))).into_response()
    }
}
