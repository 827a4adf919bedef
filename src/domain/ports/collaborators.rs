//! Collaborator ports - speech recognition and dialogue generation.
//!
//! Both capabilities live outside the engine. They are modeled as narrow,
//! interchangeable traits so the engine can be driven by any provider, and
//! by deterministic stubs in tests.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{PromptRequest, RecognizedUtterance};

/// Raw learner audio for one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioTurn {
    pub session_id: Uuid,
    pub turn: u32,
    pub audio: Vec<u8>,
}

/// Learner audio capture, one buffer per turn.
#[async_trait]
pub trait AudioSource: Send + Sync {
    /// Capture the learner's reply to `prompt`. `None` means the learner
    /// ended the conversation.
    async fn capture(&self, session_id: Uuid, turn: u32, prompt: &str) -> DomainResult<Option<Vec<u8>>>;
}

/// Audio in, text plus confidence out.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &'static str;

    /// Recognize one learner turn.
    async fn recognize(&self, turn: &AudioTurn) -> DomainResult<RecognizedUtterance>;
}

/// Scenario parameters in, next conversational prompt out.
#[async_trait]
pub trait DialogueGenerator: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &'static str;

    /// Produce the partner's next line for the given constraints.
    async fn next_prompt(&self, request: &PromptRequest) -> DomainResult<String>;
}
