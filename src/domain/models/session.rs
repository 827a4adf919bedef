//! Domain models for practice sessions.
//!
//! A `SessionPlan` is produced once by the planner and never changes. The
//! per-session `SessionState` carries everything the tracker accumulates and
//! is passed explicitly through every turn; there is no shared "current
//! session".
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::goal::{ContextTag, Goal, GoalId, GoalOutcome, TargetPattern};
use super::profile::{AssessmentProfile, Band, CurriculumLevel};
use super::signal::Domain;

/// How often the conversation partner corrects the learner, 0 (never) to 3
/// (every error).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct CorrectionDensity(u8);

impl CorrectionDensity {
    pub const MAX: u8 = 3;

    pub const fn new(value: u8) -> Option<Self> {
        if value <= Self::MAX {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn clamped(value: u8) -> Self {
        Self(value.min(Self::MAX))
    }

    pub const fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for CorrectionDensity {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("correction density {value} out of range 0-3"))
    }
}

impl From<CorrectionDensity> for u8 {
    fn from(density: CorrectionDensity) -> Self {
        density.0
    }
}

/// Role-play framing handed to the dialogue collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub template_id: String,
    /// Role the conversation partner plays
    pub role: String,
    pub setting: String,
}

/// Forms the conversation should elicit for one goal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElicitationTarget {
    pub goal_id: GoalId,
    pub patterns: Vec<TargetPattern>,
}

/// Parameterized conversation scenario for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionPlan {
    pub session_id: Uuid,
    /// 1 to 3 goals, in selection order
    pub goals: Vec<Goal>,
    pub context: ContextTag,
    pub scenario: Scenario,
    pub targets: Vec<ElicitationTarget>,
    pub correction_density: CorrectionDensity,
    pub turn_budget: u32,
    pub duration_minutes: f64,
    /// Seed used for the scenario tie-break
    pub seed: u64,
    pub catalog_version: u32,
}

impl SessionPlan {
    /// Position of a goal in the plan, used as the deterministic tie-break.
    pub fn goal_position(&self, goal_id: &GoalId) -> Option<usize> {
        self.goals.iter().position(|g| &g.id == goal_id)
    }
}

/// Recognizer confidence for one word.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordConfidence {
    pub word: String,
    pub confidence: f64,
}

/// One recognized learner turn, as produced by the speech collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RecognizedUtterance {
    pub text: String,
    /// Overall recognition confidence in [0,1]
    pub confidence: f64,
    #[serde(default)]
    pub words: Vec<WordConfidence>,
    /// Targets the dialogue collaborator was eliciting this turn; `None`
    /// means every pending target
    #[serde(default)]
    pub focus: Option<Vec<GoalId>>,
}

impl RecognizedUtterance {
    pub fn new(text: impl Into<String>, confidence: f64) -> Self {
        Self {
            text: text.into(),
            confidence,
            words: Vec::new(),
            focus: None,
        }
    }

    pub fn with_words(mut self, words: Vec<WordConfidence>) -> Self {
        self.words = words;
        self
    }

    pub fn with_focus(mut self, focus: Vec<GoalId>) -> Self {
        self.focus = Some(focus);
        self
    }
}

/// Per-turn judgement for one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    NotAttempted,
    Partial,
    Matched,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotAttempted => "not_attempted",
            Self::Partial => "partial",
            Self::Matched => "matched",
        }
    }
}

/// Verdict given on a specific turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnVerdict {
    pub turn: u32,
    pub verdict: Verdict,
}

/// Pronunciation observation supplied by the speech collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PronunciationNote {
    /// Goal the note belongs to, if any
    #[serde(default)]
    pub goal_id: Option<GoalId>,
    /// Intended form, e.g. "ㅓ in 어디"
    pub target: String,
    /// What the recognizer heard
    pub heard: String,
    /// Distance from the target in [0,1]; higher is worse
    pub severity: f64,
}

/// Accumulated elicitation evidence for one goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElicitationRecord {
    pub goal_id: GoalId,
    pub attempts: u32,
    pub matched: u32,
    pub partial: u32,
    pub unmatched: u32,
    pub verdicts: Vec<TurnVerdict>,
    pub pronunciation_note: Option<PronunciationNote>,
}

impl ElicitationRecord {
    pub fn new(goal_id: GoalId) -> Self {
        Self {
            goal_id,
            attempts: 0,
            matched: 0,
            partial: 0,
            unmatched: 0,
            verdicts: Vec::new(),
            pronunciation_note: None,
        }
    }

    pub fn is_matched(&self) -> bool {
        self.matched > 0
    }

    /// Best verdict seen so far.
    pub fn best_verdict(&self) -> Verdict {
        self.verdicts
            .iter()
            .map(|v| v.verdict)
            .max()
            .unwrap_or(Verdict::NotAttempted)
    }

    /// Share of attempts that produced the target; partials count half.
    pub fn success_ratio(&self) -> f64 {
        if self.attempts == 0 {
            return 0.0;
        }
        (f64::from(self.matched) + 0.5 * f64::from(self.partial)) / f64::from(self.attempts)
    }

    pub fn outcome(&self) -> GoalOutcome {
        match self.best_verdict() {
            Verdict::Matched => GoalOutcome::Succeeded,
            Verdict::Partial => GoalOutcome::Partial,
            Verdict::NotAttempted => GoalOutcome::Attempted,
        }
    }
}

/// Structured instructions for the dialogue collaborator. The engine never
/// writes conversational text itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptRequest {
    pub session_id: Uuid,
    pub context: ContextTag,
    pub scenario: Scenario,
    pub pending: Vec<ElicitationTarget>,
    pub correction_density: CorrectionDensity,
    pub turns_remaining: u32,
    /// Ask for a scripted re-prompt instead of free generation
    pub scripted_fallback: bool,
}

/// Result of tracking one turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnOutcome {
    pub turn: u32,
    pub usable: bool,
    /// Records that were in focus this turn, after the update
    pub updates: Vec<ElicitationRecord>,
    /// Targets still unmatched, in plan order
    pub pending: Vec<GoalId>,
    pub turns_remaining: u32,
    pub budget_exhausted: bool,
    /// Repeated unusable turns; the caller should switch to a scripted prompt
    pub fallback_required: bool,
}

/// Mutable state of one session, owned by the caller and keyed by session id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: Uuid,
    pub learner_id: String,
    pub plan: SessionPlan,
    pub profile_id: Uuid,
    pub curriculum_level: CurriculumLevel,
    pub global_stage: Band,
    /// Domains the session's profile scored
    #[serde(default)]
    pub scored_domains: Vec<Domain>,
    pub records: BTreeMap<GoalId, ElicitationRecord>,
    pub pronunciation_notes: Vec<PronunciationNote>,
    pub turns_taken: u32,
    pub consecutive_unusable: u32,
    pub started_at: DateTime<Utc>,
}

impl SessionState {
    pub fn new(plan: SessionPlan, profile: &AssessmentProfile) -> Self {
        let records = plan
            .targets
            .iter()
            .map(|t| (t.goal_id.clone(), ElicitationRecord::new(t.goal_id.clone())))
            .collect();

        Self {
            session_id: plan.session_id,
            learner_id: profile.learner_id.clone(),
            plan,
            profile_id: profile.id,
            curriculum_level: profile.curriculum_level.clone(),
            global_stage: profile.global_stage,
            scored_domains: profile.scored_domains(),
            records,
            pronunciation_notes: Vec::new(),
            turns_taken: 0,
            consecutive_unusable: 0,
            started_at: Utc::now(),
        }
    }

    /// Targets with patterns that have not been matched yet, in plan order.
    pub fn pending_targets(&self) -> Vec<&ElicitationTarget> {
        self.plan
            .targets
            .iter()
            .filter(|t| !t.patterns.is_empty())
            .filter(|t| !self.records.get(&t.goal_id).is_some_and(ElicitationRecord::is_matched))
            .collect()
    }

    pub fn pending_goal_ids(&self) -> Vec<GoalId> {
        self.pending_targets()
            .into_iter()
            .map(|t| t.goal_id.clone())
            .collect()
    }

    pub fn turns_remaining(&self) -> u32 {
        self.plan.turn_budget.saturating_sub(self.turns_taken)
    }

    pub fn budget_exhausted(&self) -> bool {
        self.turns_taken >= self.plan.turn_budget
    }

    /// Build the next instruction for the dialogue collaborator.
    pub fn prompt_request(&self, scripted_fallback: bool) -> PromptRequest {
        PromptRequest {
            session_id: self.session_id,
            context: self.plan.context,
            scenario: self.plan.scenario.clone(),
            pending: self.pending_targets().into_iter().cloned().collect(),
            correction_density: self.plan.correction_density,
            turns_remaining: self.turns_remaining(),
            scripted_fallback,
        }
    }
}
