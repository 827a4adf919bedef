//! Domain layer for the kospeak engine
//!
//! This module contains core data models, error types and port traits.

pub mod errors;
pub mod models;
pub mod ports;

// Re-export error types for convenient access
pub use errors::{DomainError, DomainResult};
