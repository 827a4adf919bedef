//! Infrastructure layer module
//!
//! - Configuration management (figment)
//! - Logging infrastructure (tracing)
//!
//! Storage and collaborator implementations live in `crate::adapters`.

pub mod config;
pub mod logging;
