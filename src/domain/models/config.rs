use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::signal::{Domain, ItemType};

/// Main configuration structure for kospeak
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Diagnostic scoring configuration
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Goal selection configuration
    #[serde(default)]
    pub goals: GoalSelectionConfig,

    /// Session planning configuration
    #[serde(default)]
    pub planner: PlannerConfig,

    /// Elicitation tracking configuration
    #[serde(default)]
    pub tracker: TrackerConfig,

    /// Debrief configuration
    #[serde(default)]
    pub debrief: DebriefConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".kospeak/kospeak.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stderr only when unset
    #[serde(default)]
    pub log_dir: Option<String>,

    /// File rotation: daily, hourly or never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}

/// Diagnostic scoring configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ScoringConfig {
    /// Lowest raw score of each band 0..=5; must start at 0.0 and increase
    #[serde(default = "default_band_lower_bounds")]
    pub band_lower_bounds: [f64; 6],

    /// Weight of each domain in the global stage; unlisted domains weigh 1.0
    #[serde(default)]
    pub domain_weights: BTreeMap<Domain, f64>,

    /// Discriminating weight per item type; unlisted types weigh 1.0
    #[serde(default)]
    pub item_type_weights: BTreeMap<ItemType, f64>,

    /// Pseudo-count damping confidence for small samples
    #[serde(default = "default_confidence_prior")]
    pub confidence_prior: f64,

    /// Reject profiles with any unassessed domain instead of marking it unscored
    #[serde(default)]
    pub require_complete_coverage: bool,
}

const fn default_band_lower_bounds() -> [f64; 6] {
    [0.0, 0.2, 0.4, 0.6, 0.8, 1.0]
}

const fn default_confidence_prior() -> f64 {
    1.0
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            band_lower_bounds: default_band_lower_bounds(),
            domain_weights: BTreeMap::new(),
            item_type_weights: BTreeMap::new(),
            confidence_prior: default_confidence_prior(),
            require_complete_coverage: false,
        }
    }
}

impl ScoringConfig {
    pub fn domain_weight(&self, domain: Domain) -> f64 {
        self.domain_weights.get(&domain).copied().unwrap_or(1.0)
    }

    pub fn item_type_weight(&self, item_type: ItemType) -> f64 {
        self.item_type_weights.get(&item_type).copied().unwrap_or(1.0)
    }
}

/// Goal selection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GoalSelectionConfig {
    /// Number of most recent sessions in the recency window
    #[serde(default = "default_recency_window")]
    pub recency_window_sessions: usize,

    #[serde(default = "default_unit_weight")]
    pub recency_weight: f64,

    /// Sessions during which a freshly unlocked goal keeps its bonus
    #[serde(default = "default_progression_window")]
    pub progression_window_sessions: usize,

    #[serde(default = "default_unit_weight")]
    pub progression_weight: f64,

    /// Bonus for goals that list the requested context
    #[serde(default = "default_context_weight")]
    pub context_weight: f64,
}

const fn default_recency_window() -> usize {
    10
}

const fn default_progression_window() -> usize {
    3
}

const fn default_unit_weight() -> f64 {
    1.0
}

const fn default_context_weight() -> f64 {
    0.5
}

impl Default for GoalSelectionConfig {
    fn default() -> Self {
        Self {
            recency_window_sessions: default_recency_window(),
            recency_weight: default_unit_weight(),
            progression_window_sessions: default_progression_window(),
            progression_weight: default_unit_weight(),
            context_weight: default_context_weight(),
        }
    }
}

/// Session planning configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PlannerConfig {
    /// Average length of one learner/partner exchange
    #[serde(default = "default_average_turn_seconds")]
    pub average_turn_seconds: f64,

    /// Smallest viable turn budget
    #[serde(default = "default_min_turns")]
    pub min_turns: u32,

    /// Turns each selected goal needs at minimum
    #[serde(default = "default_min_turns_per_goal")]
    pub min_turns_per_goal: u32,

    #[serde(default = "default_recommended_min_minutes")]
    pub recommended_min_minutes: f64,

    #[serde(default = "default_recommended_max_minutes")]
    pub recommended_max_minutes: f64,

    /// Correction density per global stage 0..=5; must be non-increasing
    #[serde(default = "default_correction_density_by_stage")]
    pub correction_density_by_stage: [u8; 6],
}

const fn default_average_turn_seconds() -> f64 {
    40.0
}

const fn default_min_turns() -> u32 {
    4
}

const fn default_min_turns_per_goal() -> u32 {
    2
}

const fn default_recommended_min_minutes() -> f64 {
    7.0
}

const fn default_recommended_max_minutes() -> f64 {
    10.0
}

const fn default_correction_density_by_stage() -> [u8; 6] {
    [3, 3, 2, 1, 1, 0]
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            average_turn_seconds: default_average_turn_seconds(),
            min_turns: default_min_turns(),
            min_turns_per_goal: default_min_turns_per_goal(),
            recommended_min_minutes: default_recommended_min_minutes(),
            recommended_max_minutes: default_recommended_max_minutes(),
            correction_density_by_stage: default_correction_density_by_stage(),
        }
    }
}

/// Elicitation tracking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TrackerConfig {
    /// Turns below this recognition confidence are unusable
    #[serde(default = "default_min_utterance_confidence")]
    pub min_utterance_confidence: f64,

    /// Matched words below this confidence only count as partial
    #[serde(default = "default_min_word_confidence")]
    pub min_word_confidence: f64,

    /// Consecutive unusable turns before a scripted fallback is requested
    #[serde(default = "default_max_consecutive_unusable")]
    pub max_consecutive_unusable: u32,
}

const fn default_min_utterance_confidence() -> f64 {
    0.5
}

const fn default_min_word_confidence() -> f64 {
    0.4
}

const fn default_max_consecutive_unusable() -> u32 {
    3
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            min_utterance_confidence: default_min_utterance_confidence(),
            min_word_confidence: default_min_word_confidence(),
            max_consecutive_unusable: default_max_consecutive_unusable(),
        }
    }
}

/// Debrief configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DebriefConfig {
    /// Highlights kept per category (1-3)
    #[serde(default = "default_max_highlights")]
    pub max_highlights: usize,

    /// Flag a reassessment when every goal in a session succeeds
    #[serde(default = "default_suggest_reassessment")]
    pub suggest_reassessment: bool,
}

const fn default_max_highlights() -> usize {
    3
}

const fn default_suggest_reassessment() -> bool {
    true
}

impl Default for DebriefConfig {
    fn default() -> Self {
        Self {
            max_highlights: default_max_highlights(),
            suggest_reassessment: default_suggest_reassessment(),
        }
    }
}
