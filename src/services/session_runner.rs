//! Session runner.
//!
//! Drives one conversation through the collaborator ports: ask the dialogue
//! generator for the next prompt, capture and recognize the learner's reply,
//! and track the turn. Collaborator failures become unusable turns.

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::errors::DomainResult;
use crate::domain::models::{RecognizedUtterance, SessionState, TurnOutcome};
use crate::domain::ports::{
    AudioSource, AudioTurn, DialogueGenerator, ProgressHistoryRepository, SpeechRecognizer,
};
use crate::services::coaching_engine::CoachingEngine;

/// Why a conversation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    AllTargetsMatched,
    BudgetExhausted,
    LearnerEnded,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AllTargetsMatched => "all_targets_matched",
            Self::BudgetExhausted => "budget_exhausted",
            Self::LearnerEnded => "learner_ended",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptTurn {
    /// `None` when the dialogue generator failed
    pub prompt: Option<String>,
    pub utterance: RecognizedUtterance,
    pub outcome: TurnOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionTranscript {
    pub turns: Vec<TranscriptTurn>,
    pub stop_reason: StopReason,
}

pub struct SessionRunner {
    dialogue: Arc<dyn DialogueGenerator>,
    recognizer: Arc<dyn SpeechRecognizer>,
    audio: Arc<dyn AudioSource>,
}

impl SessionRunner {
    pub fn new(
        dialogue: Arc<dyn DialogueGenerator>,
        recognizer: Arc<dyn SpeechRecognizer>,
        audio: Arc<dyn AudioSource>,
    ) -> Self {
        Self {
            dialogue,
            recognizer,
            audio,
        }
    }

    fn stop_reason(state: &SessionState) -> Option<StopReason> {
        let has_targets = state.plan.targets.iter().any(|t| !t.patterns.is_empty());
        if has_targets && state.pending_targets().is_empty() {
            return Some(StopReason::AllTargetsMatched);
        }
        if state.budget_exhausted() {
            return Some(StopReason::BudgetExhausted);
        }
        None
    }

    /// Run turns until every target is matched, the budget is spent or the
    /// learner stops.
    pub async fn run<H: ProgressHistoryRepository>(
        &self,
        engine: &CoachingEngine<H>,
        state: &mut SessionState,
    ) -> DomainResult<SessionTranscript> {
        let mut turns = Vec::new();
        let mut scripted_fallback = false;

        let stop_reason = loop {
            if let Some(reason) = Self::stop_reason(state) {
                break reason;
            }

            let request = state.prompt_request(scripted_fallback);
            let prompt = match self.dialogue.next_prompt(&request).await {
                Ok(prompt) => Some(prompt),
                Err(e) => {
                    warn!(
                        session_id = %state.session_id,
                        provider = self.dialogue.name(),
                        error = %e,
                        "dialogue generator failed"
                    );
                    None
                }
            };

            let turn = state.turns_taken + 1;
            let utterance = match &prompt {
                Some(prompt) => match self.audio.capture(state.session_id, turn, prompt).await {
                    Ok(Some(audio)) => self.recognize(state, turn, audio).await,
                    Ok(None) => break StopReason::LearnerEnded,
                    Err(e) => {
                        warn!(session_id = %state.session_id, turn, error = %e, "audio capture failed");
                        RecognizedUtterance::default()
                    }
                },
                None => RecognizedUtterance::default(),
            };

            let outcome = engine.track_turn(state, &utterance)?;
            scripted_fallback = outcome.fallback_required;
            turns.push(TranscriptTurn {
                prompt,
                utterance,
                outcome,
            });
        };

        info!(
            session_id = %state.session_id,
            turns = turns.len(),
            stop_reason = stop_reason.as_str(),
            "conversation ended"
        );
        Ok(SessionTranscript { turns, stop_reason })
    }

    async fn recognize(&self, state: &SessionState, turn: u32, audio: Vec<u8>) -> RecognizedUtterance {
        let audio_turn = AudioTurn {
            session_id: state.session_id,
            turn,
            audio,
        };
        match self.recognizer.recognize(&audio_turn).await {
            Ok(utterance) => utterance,
            Err(e) => {
                warn!(
                    session_id = %state.session_id,
                    turn,
                    provider = self.recognizer.name(),
                    error = %e,
                    "speech recognizer failed"
                );
                RecognizedUtterance::default()
            }
        }
    }
}
