//! Scoring, selection, planning and tracking services.

pub mod band_estimator;
pub mod coaching_engine;
pub mod curriculum;
pub mod debrief_aggregator;
pub mod elicitation_tracker;
pub mod goal_catalog;
pub mod goal_mapper;
pub mod item_scorer;
pub mod session_planner;
pub mod session_runner;
pub mod signal_normalizer;
pub mod table_registry;

pub use band_estimator::BandEstimator;
pub use coaching_engine::CoachingEngine;
pub use curriculum::{CurriculumRegistry, CurriculumTable};
pub use debrief_aggregator::DebriefAggregator;
pub use elicitation_tracker::ElicitationTracker;
pub use goal_catalog::{GoalCatalog, GoalCatalogRegistry};
pub use goal_mapper::{GoalMapper, GoalRequest, ScoredGoal, MAX_GOALS_PER_SESSION};
pub use item_scorer::{AssessmentBank, AssessmentItem, ScoringRule};
pub use session_planner::{ScenarioTemplates, SessionPlanner};
pub use session_runner::{SessionRunner, SessionTranscript, StopReason};
pub use signal_normalizer::{NormalizedSignals, SignalNormalizer};
pub use table_registry::{TableRegistry, VersionedTable};
