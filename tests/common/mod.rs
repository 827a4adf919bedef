//! Common test utilities for integration tests
//!
//! Shared fixtures for building profiles, engines and temporary databases.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

use kospeak::adapters::memory::InMemoryHistoryRepository;
use kospeak::{AssessmentProfile, CoachingEngine, Config, Domain, ItemResponse, ItemType};

/// Create a temporary test database path
///
/// The directory is removed when the returned `TempDir` is dropped.
pub fn temp_db_path() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_path = dir.path().join("kospeak.db");
    (dir, db_path)
}

/// Initialize tracing for test output.
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// One multiple-choice response per listed domain.
pub fn responses(scores: &[(Domain, f64)]) -> Vec<ItemResponse> {
    scores
        .iter()
        .map(|(domain, score)| {
            ItemResponse::new(format!("{domain}_item"), ItemType::MultipleChoice, *domain, *score)
        })
        .collect()
}

/// The same score in every domain.
pub fn uniform_responses(score: f64) -> Vec<ItemResponse> {
    let scores: Vec<(Domain, f64)> = Domain::ALL.into_iter().map(|d| (d, score)).collect();
    responses(&scores)
}

pub fn memory_engine() -> (CoachingEngine<InMemoryHistoryRepository>, Arc<InMemoryHistoryRepository>) {
    let history = Arc::new(InMemoryHistoryRepository::new());
    let engine = CoachingEngine::new(&Config::default(), history.clone())
        .expect("builtin tables load");
    (engine, history)
}

pub fn beginner_profile(engine: &CoachingEngine<InMemoryHistoryRepository>, learner: &str) -> AssessmentProfile {
    engine
        .compute_profile(learner, &uniform_responses(0.1))
        .expect("profile computes")
}
