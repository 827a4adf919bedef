//! Domain errors for the kospeak engine.

use thiserror::Error;

use crate::domain::models::Domain;

/// Format a list of domains as `grammar, vocabulary`.
fn format_domains(domains: &[Domain]) -> String {
    domains
        .iter()
        .map(|d| d.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Domain-level errors that can occur in the kospeak engine.
///
/// Input-incompleteness and planning errors are surfaced to the caller.
/// `NoEligibleGoals` is recoverable with the open-conversation goal.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Incomplete input: no contributing items for {}", format_domains(.0))]
    IncompleteInput(Vec<Domain>),

    #[error("Insufficient coverage: {scored} of {total} domains scored, at least {required} required")]
    InsufficientCoverage {
        scored: usize,
        total: usize,
        required: usize,
    },

    #[error("No eligible goals: {0}")]
    NoEligibleGoals(String),

    #[error("Planning failed: {0}")]
    Planning(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Table version conflict: {table} version {version} is not newer than {current}")]
    TableVersionConflict {
        table: String,
        version: u32,
        current: u32,
    },

    #[error("Unknown {table} version: {version}")]
    UnknownTableVersion { table: String, version: u32 },

    #[error("Goal catalog invalid: {0}")]
    CatalogInvalid(String),

    #[error("Collaborator unavailable: {0}")]
    CollaboratorUnavailable(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for DomainError {
    fn from(err: serde_yaml::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}
