//! Post-session debrief report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::goal::{GoalId, GoalOutcome};
use super::profile::ProfileDelta;

/// Whether a highlight asks for correction or acknowledges success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HighlightKind {
    Correction,
    Praise,
}

/// One ranked feedback item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Highlight {
    pub goal_id: Option<GoalId>,
    pub kind: HighlightKind,
    pub message: String,
    /// Ranking key in [0,1]; higher means more in need of attention
    pub salience: f64,
}

/// A goal practiced in the session and how it went.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PracticedGoal {
    pub goal_id: GoalId,
    pub title: String,
    pub outcome: GoalOutcome,
    pub attempts: u32,
}

/// Structured feedback produced when a session ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebriefReport {
    pub session_id: Uuid,
    pub learner_id: String,
    pub goals_practiced: Vec<PracticedGoal>,
    /// At most three
    pub pronunciation_highlights: Vec<Highlight>,
    /// At most three
    pub pattern_highlights: Vec<Highlight>,
    pub progress_note: String,
    /// Bands are never re-estimated by a debrief, so this is all zeros
    pub profile_delta: ProfileDelta,
    /// Advisory only; reassessment cadence is never enforced
    pub reassessment_suggested: bool,
    pub turns_taken: u32,
    pub generated_at: DateTime<Utc>,
}
