//! Elicitation tracking.
//!
//! Judges each recognized learner turn against the session's pending targets
//! and accumulates the evidence in the caller-owned `SessionState`.

use regex::Regex;
use tracing::{debug, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    ElicitationTarget, GoalId, PatternKind, PronunciationNote, RecognizedUtterance,
    SessionState, TargetPattern, TrackerConfig, TurnOutcome, TurnVerdict, Verdict,
};

/// A target form found in the utterance.
#[derive(Debug, Clone, PartialEq)]
struct FormHit {
    form: String,
    heard: String,
    confidence: f64,
}

/// Verdict for one target plus any low-confidence forms.
#[derive(Debug, Clone, PartialEq)]
pub struct Judgement {
    pub verdict: Verdict,
    pub notes: Vec<PronunciationNote>,
}

#[derive(Debug, Clone)]
pub struct ElicitationTracker {
    config: TrackerConfig,
}

impl ElicitationTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self { config }
    }

    /// Empty or low-confidence recognitions carry no evidence.
    pub fn is_usable(&self, utterance: &RecognizedUtterance) -> bool {
        !utterance.text.trim().is_empty()
            && utterance.confidence.is_finite()
            && utterance.confidence >= self.config.min_utterance_confidence
    }

    /// Judge one target against one usable utterance.
    pub fn judge(
        &self,
        target: &ElicitationTarget,
        utterance: &RecognizedUtterance,
    ) -> DomainResult<Judgement> {
        let mut verdicts = Vec::with_capacity(target.patterns.len());
        let mut notes = Vec::new();

        for pattern in &target.patterns {
            let hits = find_forms(pattern, utterance)?;
            let confident = hits
                .iter()
                .filter(|h| h.confidence >= self.config.min_word_confidence)
                .count();

            for hit in hits.iter().filter(|h| h.confidence < self.config.min_word_confidence) {
                notes.push(PronunciationNote {
                    goal_id: Some(target.goal_id.clone()),
                    target: hit.form.clone(),
                    heard: hit.heard.clone(),
                    severity: (1.0 - hit.confidence).clamp(0.0, 1.0),
                });
            }

            let verdict = if confident >= pattern.required_matches() {
                Verdict::Matched
            } else if !hits.is_empty() {
                Verdict::Partial
            } else {
                Verdict::NotAttempted
            };
            verdicts.push(verdict);
        }

        let verdict = if verdicts.is_empty() {
            Verdict::NotAttempted
        } else if verdicts.iter().all(|v| *v == Verdict::Matched) {
            Verdict::Matched
        } else if verdicts.iter().all(|v| *v == Verdict::NotAttempted) {
            Verdict::NotAttempted
        } else {
            Verdict::Partial
        };

        Ok(Judgement { verdict, notes })
    }

    /// Record one learner turn.
    pub fn track_turn(
        &self,
        state: &mut SessionState,
        utterance: &RecognizedUtterance,
    ) -> DomainResult<TurnOutcome> {
        let pending = state.pending_goal_ids();
        let in_focus: Vec<GoalId> = match &utterance.focus {
            Some(focus) => pending.into_iter().filter(|id| focus.contains(id)).collect(),
            None => pending,
        };

        // judge everything first so a failed judgement leaves the state untouched
        let usable = self.is_usable(utterance);
        let mut judgements = Vec::with_capacity(in_focus.len());
        for goal_id in &in_focus {
            let judgement = if usable {
                let target = state
                    .plan
                    .targets
                    .iter()
                    .find(|t| &t.goal_id == goal_id)
                    .ok_or_else(|| {
                        DomainError::InvalidInput(format!("goal {goal_id} is not a session target"))
                    })?;
                self.judge(target, utterance)?
            } else {
                Judgement {
                    verdict: Verdict::NotAttempted,
                    notes: Vec::new(),
                }
            };
            judgements.push(judgement);
        }

        state.turns_taken += 1;
        let turn = state.turns_taken;
        if usable {
            state.consecutive_unusable = 0;
        } else {
            state.consecutive_unusable += 1;
            warn!(
                session_id = %state.session_id,
                turn,
                confidence = utterance.confidence,
                consecutive = state.consecutive_unusable,
                "unusable turn"
            );
        }

        for (goal_id, judgement) in in_focus.iter().zip(judgements) {
            let Some(record) = state.records.get_mut(goal_id) else {
                continue;
            };
            record.verdicts.push(TurnVerdict {
                turn,
                verdict: judgement.verdict,
            });
            if usable {
                record.attempts += 1;
                match judgement.verdict {
                    Verdict::Matched => record.matched += 1,
                    Verdict::Partial => record.partial += 1,
                    Verdict::NotAttempted => record.unmatched += 1,
                }
            }

            for note in judgement.notes {
                let worse = record
                    .pronunciation_note
                    .as_ref()
                    .is_none_or(|n| note.severity > n.severity);
                if worse {
                    record.pronunciation_note = Some(note.clone());
                }
                state.pronunciation_notes.push(note);
            }

            debug!(
                session_id = %state.session_id,
                turn,
                goal_id = %goal_id,
                verdict = judgement.verdict.as_str(),
                "judged target"
            );
        }

        let updates = in_focus
            .iter()
            .filter_map(|id| state.records.get(id).cloned())
            .collect();

        let budget_exhausted = state.budget_exhausted();
        if turn > state.plan.turn_budget {
            debug!(session_id = %state.session_id, turn, "turn beyond budget");
        }

        Ok(TurnOutcome {
            turn,
            usable,
            updates,
            pending: state.pending_goal_ids(),
            turns_remaining: state.turns_remaining(),
            budget_exhausted,
            fallback_required: state.consecutive_unusable >= self.config.max_consecutive_unusable,
        })
    }
}

/// Every form of the pattern present in the utterance, with the confidence
/// of the word that carried it.
fn find_forms(pattern: &TargetPattern, utterance: &RecognizedUtterance) -> DomainResult<Vec<FormHit>> {
    let mut hits = Vec::new();
    for form in &pattern.forms {
        let hit = match pattern.kind {
            PatternKind::Lexical | PatternKind::PhonemeContrast => {
                if utterance.text.contains(form.as_str()) {
                    Some(word_evidence(utterance, form, |word| word.contains(form.as_str())))
                } else {
                    None
                }
            }
            PatternKind::Morphological => {
                let regex = Regex::new(form).map_err(|e| {
                    DomainError::InvalidInput(format!("invalid pattern '{form}': {e}"))
                })?;
                regex.find(&utterance.text).map(|m| {
                    let matched = m.as_str().trim().to_string();
                    let mut hit = word_evidence(utterance, form, |word| regex.is_match(word));
                    if hit.heard == *form {
                        hit.heard = matched;
                    }
                    hit
                })
            }
        };
        hits.extend(hit);
    }
    Ok(hits)
}

/// Confidence of the best word matching `carries`, falling back to the
/// utterance confidence when no single word carries the form.
fn word_evidence(
    utterance: &RecognizedUtterance,
    form: &str,
    carries: impl Fn(&str) -> bool,
) -> FormHit {
    utterance
        .words
        .iter()
        .filter(|w| carries(&w.word))
        .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
        .map_or_else(
            || FormHit {
                form: form.to_string(),
                heard: form.to_string(),
                confidence: utterance.confidence,
            },
            |w| FormHit {
                form: form.to_string(),
                heard: w.word.clone(),
                confidence: w.confidence,
            },
        )
}
