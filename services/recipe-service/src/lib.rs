//! Recipe Service Library
//!
//! Serves `GET /get-recipe/{id}` by authenticating to PostgreSQL with a
//! client certificate minted by Vault for that single request. The
//! certificate and key exist on disk only while the request runs.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod db;
pub mod error;
pub mod material;
pub mod server;
pub mod shutdown;
pub mod workflow;

pub use config::{Config, ConfigError};
pub use db::{DatabaseConfig, PgConnector, Recipe, RecipeConnector, RecipeSession};
pub use error::{ErrorCode, ErrorResponse, RecipeError};
pub use material::MaterialSet;
pub use server::router;
pub use workflow::RecipeWorkflow;
