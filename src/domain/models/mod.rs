pub mod config;
pub mod debrief;
pub mod goal;
pub mod profile;
pub mod session;
pub mod signal;

pub use config::{
    Config, DatabaseConfig, DebriefConfig, GoalSelectionConfig, LoggingConfig, PlannerConfig,
    ScoringConfig, TrackerConfig,
};
pub use debrief::{DebriefReport, Highlight, HighlightKind, PracticedGoal};
pub use goal::{
    BandRange, ContextTag, Goal, GoalHistoryEntry, GoalId, GoalOutcome, PatternKind,
    TargetPattern,
};
pub use profile::{AssessmentProfile, Band, CurriculumLevel, DomainBand, ProfileDelta};
pub use session::{
    CorrectionDensity, ElicitationRecord, ElicitationTarget, PromptRequest, PronunciationNote,
    RecognizedUtterance, Scenario, SessionPlan, SessionState, TurnOutcome, TurnVerdict, Verdict,
    WordConfidence,
};
pub use signal::{Domain, DomainSignal, ItemResponse, ItemType};
