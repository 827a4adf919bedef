//! Kospeak - Diagnostic Scoring and Adaptive Session Planning
//!
//! Kospeak turns a learner's diagnostic answers into a per-domain ability
//! profile, chooses what to practice next from a versioned goal catalog,
//! plans a conversation around those goals, tracks whether the learner
//! produces the target forms and closes each session with a ranked debrief
//! and an append-only progress history.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Models, errors and port traits
//! - **Service Layer** (`services`): Scoring, goal mapping, planning, tracking and debrief
//! - **Adapter Layer** (`adapters`): SQLite persistence, in-memory and scripted collaborators
//! - **Infrastructure Layer** (`infrastructure`): Configuration and logging
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use kospeak::adapters::memory::InMemoryHistoryRepository;
//! use kospeak::{CoachingEngine, Config, ContextTag, GoalRequest};
//!
//! # async fn run(responses: &[kospeak::ItemResponse]) -> anyhow::Result<()> {
//! let engine = CoachingEngine::new(&Config::default(), Arc::new(InMemoryHistoryRepository::new()))?;
//! let profile = engine.compute_profile("mina", responses)?;
//! let goals = engine
//!     .select_goals_for(&profile, &GoalRequest::new(ContextTag::School, 2))
//!     .await?;
//! let plan = engine.plan_session(goals, ContextTag::School, 8.0, None, &profile)?;
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{
    AssessmentProfile, Band, Config, ContextTag, DebriefReport, Domain, DomainBand, Goal,
    GoalHistoryEntry, GoalId, GoalOutcome, ItemResponse, ItemType, ProfileDelta,
    RecognizedUtterance, SessionPlan, SessionState, TurnOutcome,
};
pub use domain::ports::{ProfileRepository, ProgressHistoryRepository};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{CoachingEngine, GoalRequest, SessionRunner};
