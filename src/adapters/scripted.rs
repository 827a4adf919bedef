//! Deterministic collaborators.
//!
//! `TemplateDialogue` renders prompts from fixed templates,
//! `ScriptedRecognizer` replays prepared learner lines and `ScriptedAudio`
//! stands in for a microphone. The CLI `rehearse` command and the tests
//! drive whole sessions with them.

use async_trait::async_trait;
use std::collections::VecDeque;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{PromptRequest, RecognizedUtterance};
use crate::domain::ports::{AudioSource, AudioTurn, DialogueGenerator, SpeechRecognizer};

const DEFAULT_CONFIDENCE: f64 = 0.9;

/// Template-based dialogue generator.
#[derive(Debug, Clone, Default)]
pub struct TemplateDialogue;

impl TemplateDialogue {
    pub fn new() -> Self {
        Self
    }

    pub fn render(request: &PromptRequest) -> String {
        let scenario = &request.scenario;
        let hint = request
            .pending
            .first()
            .and_then(|t| t.patterns.first())
            .map(|p| p.label.as_str());

        match (request.scripted_fallback, hint) {
            (true, Some(hint)) => format!("천천히 다시 말해 주세요. [{hint}]"),
            (true, None) => "천천히 다시 말해 주세요.".to_string(),
            (false, Some(hint)) => format!("({}) {}: {hint}", scenario.role, scenario.setting),
            (false, None) => format!("({}) {}: 자유롭게 이야기해 보세요.", scenario.role, scenario.setting),
        }
    }
}

#[async_trait]
impl DialogueGenerator for TemplateDialogue {
    fn name(&self) -> &'static str {
        "template"
    }

    async fn next_prompt(&self, request: &PromptRequest) -> DomainResult<String> {
        Ok(Self::render(request))
    }
}

/// Replays prepared learner lines in order, one per recognized turn.
#[derive(Debug)]
pub struct ScriptedRecognizer {
    lines: Mutex<VecDeque<String>>,
    confidence: f64,
}

impl ScriptedRecognizer {
    pub fn new(lines: Vec<String>) -> Self {
        Self {
            lines: Mutex::new(lines.into()),
            confidence: DEFAULT_CONFIDENCE,
        }
    }

    pub fn from_lines(lines: &[&str]) -> Self {
        Self::new(lines.iter().map(|l| (*l).to_string()).collect())
    }

    /// Confidence reported for every line.
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }
}

#[async_trait]
impl SpeechRecognizer for ScriptedRecognizer {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn recognize(&self, turn: &AudioTurn) -> DomainResult<RecognizedUtterance> {
        let line = self.lines.lock().await.pop_front().ok_or_else(|| {
            DomainError::CollaboratorUnavailable(format!("script exhausted at turn {}", turn.turn))
        })?;
        Ok(RecognizedUtterance::new(line, self.confidence))
    }
}

/// Audio source yielding empty buffers, optionally for a fixed number of
/// turns before the learner stops.
#[derive(Debug)]
pub struct ScriptedAudio {
    remaining: Mutex<Option<u32>>,
}

impl ScriptedAudio {
    pub fn unlimited() -> Self {
        Self {
            remaining: Mutex::new(None),
        }
    }

    pub fn limited(turns: u32) -> Self {
        Self {
            remaining: Mutex::new(Some(turns)),
        }
    }
}

#[async_trait]
impl AudioSource for ScriptedAudio {
    async fn capture(&self, _session_id: Uuid, _turn: u32, _prompt: &str) -> DomainResult<Option<Vec<u8>>> {
        let mut remaining = self.remaining.lock().await;
        match remaining.as_mut() {
            None => Ok(Some(Vec::new())),
            Some(0) => Ok(None),
            Some(n) => {
                *n -= 1;
                Ok(Some(Vec::new()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{
        ContextTag, CorrectionDensity, ElicitationTarget, GoalId, Scenario, TargetPattern,
    };

    fn request(fallback: bool, pending: bool) -> PromptRequest {
        let pending = if pending {
            vec![ElicitationTarget {
                goal_id: GoalId::new("G7"),
                patterns: vec![TargetPattern::morphological("-았/었어요", &["(았|었)어요"])],
            }]
        } else {
            Vec::new()
        };
        PromptRequest {
            session_id: Uuid::new_v4(),
            context: ContextTag::Friends,
            scenario: Scenario {
                template_id: "friends-weekend".to_string(),
                role: "친구".to_string(),
                setting: "주말 이야기".to_string(),
            },
            pending,
            correction_density: CorrectionDensity::clamped(1),
            turns_remaining: 5,
            scripted_fallback: fallback,
        }
    }

    #[test]
    fn test_template_prompts() {
        assert_eq!(TemplateDialogue::render(&request(false, true)), "(친구) 주말 이야기: -았/었어요");
        assert!(TemplateDialogue::render(&request(true, true)).starts_with("천천히"));
        assert!(TemplateDialogue::render(&request(false, false)).contains("자유롭게"));
    }

    #[tokio::test]
    async fn test_recognizer_replays_then_fails() {
        let recognizer = ScriptedRecognizer::from_lines(&["안녕하세요"]);
        let turn = AudioTurn {
            session_id: Uuid::new_v4(),
            turn: 1,
            audio: Vec::new(),
        };
        let first = recognizer.recognize(&turn).await.unwrap();
        assert_eq!(first.text, "안녕하세요");
        assert!(first.confidence > 0.5);
        assert!(matches!(
            recognizer.recognize(&turn).await,
            Err(DomainError::CollaboratorUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_limited_audio_ends() {
        let audio = ScriptedAudio::limited(1);
        let id = Uuid::new_v4();
        assert!(audio.capture(id, 1, "").await.unwrap().is_some());
        assert!(audio.capture(id, 2, "").await.unwrap().is_none());
    }
}
