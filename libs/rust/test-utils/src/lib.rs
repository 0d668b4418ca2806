//! Shared test utilities for the recipe platform crates.
//!
//! This crate provides:
//! - Proptest generators for domain types
//! - A scriptable in-memory certificate issuer
//! - Real PKI fixtures (a CA and a client certificate) built with rcgen

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod mocks;

pub use generators::*;
