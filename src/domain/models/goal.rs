//! Goal domain model.
//!
//! Goals are concrete practice targets (a grammar pattern, a lexical set, a
//! pronunciation contrast). They live in a versioned catalog and form a
//! partial order through their prerequisites.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::profile::Band;
use super::signal::Domain;

/// Catalog identifier of a goal, e.g. `G7`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GoalId(pub String);

impl GoalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for GoalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GoalId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Conversation context a learner practices for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContextTag {
    School,
    Work,
    Travel,
    Friends,
    DailyLife,
    /// No particular context
    #[default]
    #[serde(rename = "none")]
    Unspecified,
}

impl ContextTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::School => "school",
            Self::Work => "work",
            Self::Travel => "travel",
            Self::Friends => "friends",
            Self::DailyLife => "daily_life",
            Self::Unspecified => "none",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "school" => Some(Self::School),
            "work" => Some(Self::Work),
            "travel" => Some(Self::Travel),
            "friends" => Some(Self::Friends),
            "daily_life" | "daily" => Some(Self::DailyLife),
            "none" | "" => Some(Self::Unspecified),
            _ => None,
        }
    }
}

impl std::fmt::Display for ContextTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive band range a goal applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandRange {
    pub low: Band,
    pub high: Band,
}

impl BandRange {
    pub const fn new(low: Band, high: Band) -> Self {
        Self { low, high }
    }

    pub fn contains(&self, band: Band) -> bool {
        self.low <= band && band <= self.high
    }
}

/// How a target pattern is recognized in an utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    /// Literal words or phrases
    Lexical,
    /// Regular expressions over inflected forms
    Morphological,
    /// Target words carrying a phoneme contrast
    PhonemeContrast,
}

/// A form the learner is expected to produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetPattern {
    /// Human-readable pattern, e.g. "-고 싶다"
    pub label: String,
    pub kind: PatternKind,
    /// Literal forms, or regular expressions for morphological patterns
    pub forms: Vec<String>,
    /// Forms needed for a full match; defaults to all of them
    #[serde(default)]
    pub min_matches: Option<usize>,
}

impl TargetPattern {
    pub fn lexical(label: impl Into<String>, forms: &[&str]) -> Self {
        Self::new(label, PatternKind::Lexical, forms)
    }

    pub fn morphological(label: impl Into<String>, forms: &[&str]) -> Self {
        Self::new(label, PatternKind::Morphological, forms)
    }

    pub fn phoneme_contrast(label: impl Into<String>, forms: &[&str]) -> Self {
        Self::new(label, PatternKind::PhonemeContrast, forms)
    }

    fn new(label: impl Into<String>, kind: PatternKind, forms: &[&str]) -> Self {
        Self {
            label: label.into(),
            kind,
            forms: forms.iter().map(|f| (*f).to_string()).collect(),
            min_matches: None,
        }
    }

    pub fn with_min_matches(mut self, min_matches: usize) -> Self {
        self.min_matches = Some(min_matches);
        self
    }

    /// Number of forms that must be present for a full match.
    pub fn required_matches(&self) -> usize {
        self.min_matches
            .unwrap_or(self.forms.len())
            .clamp(1, self.forms.len().max(1))
    }
}

/// A practice goal from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    pub id: GoalId,
    pub domain: Domain,
    pub band_range: BandRange,
    /// Curriculum-equivalent level ordinal the goal belongs to
    pub curriculum_level: u8,
    pub title: String,
    pub patterns: Vec<TargetPattern>,
    #[serde(default)]
    pub prerequisites: Vec<GoalId>,
    /// Contexts the goal fits well; empty means any
    #[serde(default)]
    pub contexts: Vec<ContextTag>,
}

impl Goal {
    pub const OPEN_CONVERSATION_ID: &'static str = "open-conversation";

    /// Generic goal used when nothing in the catalog is eligible.
    pub fn open_conversation() -> Self {
        Self {
            id: GoalId::new(Self::OPEN_CONVERSATION_ID),
            domain: Domain::Pragmatics,
            band_range: BandRange::new(Band::MIN, Band::MAX),
            curriculum_level: 0,
            title: "Open conversation".to_string(),
            patterns: Vec::new(),
            prerequisites: Vec::new(),
            contexts: Vec::new(),
        }
    }

    pub fn is_open_conversation(&self) -> bool {
        self.id.as_str() == Self::OPEN_CONVERSATION_ID
    }

    pub fn fits_context(&self, context: ContextTag) -> bool {
        context != ContextTag::Unspecified && self.contexts.contains(&context)
    }

    /// Validate this goal.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.as_str().is_empty() {
            return Err("Goal id cannot be empty".to_string());
        }
        if self.band_range.low > self.band_range.high {
            return Err(format!(
                "Goal {} has inverted band range {}-{}",
                self.id, self.band_range.low, self.band_range.high
            ));
        }
        if self.prerequisites.contains(&self.id) {
            return Err(format!("Goal {} lists itself as a prerequisite", self.id));
        }
        for pattern in &self.patterns {
            if pattern.forms.is_empty() {
                return Err(format!(
                    "Goal {} pattern '{}' has no forms",
                    self.id, pattern.label
                ));
            }
        }
        Ok(())
    }
}

/// Summary of how a goal went in one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalOutcome {
    Attempted,
    Partial,
    Succeeded,
}

impl GoalOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Attempted => "attempted",
            Self::Partial => "partial",
            Self::Succeeded => "succeeded",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "attempted" => Some(Self::Attempted),
            "partial" => Some(Self::Partial),
            "succeeded" => Some(Self::Succeeded),
            _ => None,
        }
    }

    /// Whether this outcome unlocks goals that list the goal as a prerequisite.
    pub fn satisfies_prerequisite(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Partial)
    }
}

/// One append-only record of a goal practiced in a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalHistoryEntry {
    pub id: Uuid,
    pub learner_id: String,
    pub session_id: Uuid,
    pub goal_id: GoalId,
    pub outcome: GoalOutcome,
    pub recorded_at: DateTime<Utc>,
}

impl GoalHistoryEntry {
    pub fn new(
        learner_id: impl Into<String>,
        session_id: Uuid,
        goal_id: GoalId,
        outcome: GoalOutcome,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            learner_id: learner_id.into(),
            session_id,
            goal_id,
            outcome,
            recorded_at,
        }
    }
}
