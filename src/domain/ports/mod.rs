//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines async trait interfaces that infrastructure adapters must implement:
//! - ProgressHistoryRepository: append-only goal history per learner
//! - ProfileRepository: immutable assessment profiles
//! - SpeechRecognizer / DialogueGenerator / AudioSource: external conversation collaborators
//!
//! These traits keep the scoring and planning services independent of
//! storage and provider choices.

pub mod collaborators;
pub mod history_repository;
pub mod profile_repository;

pub use collaborators::{AudioSource, AudioTurn, DialogueGenerator, SpeechRecognizer};
pub use history_repository::ProgressHistoryRepository;
pub use profile_repository::ProfileRepository;
