//! Assessment signal models.
//!
//! Item responses arrive already scored in [0,1] and are folded into one
//! `DomainSignal` per language domain by the signal normalizer.

use serde::{Deserialize, Serialize};

/// One of the four assessed language domains.
///
/// Declaration order is the canonical domain order used for display and
/// deterministic iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Grammar,
    Vocabulary,
    Pragmatics,
    Pronunciation,
}

impl Domain {
    /// All domains in canonical order.
    pub const ALL: [Self; 4] = [
        Self::Grammar,
        Self::Vocabulary,
        Self::Pragmatics,
        Self::Pronunciation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Grammar => "grammar",
            Self::Vocabulary => "vocabulary",
            Self::Pragmatics => "pragmatics",
            Self::Pronunciation => "pronunciation",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "grammar" => Some(Self::Grammar),
            "vocabulary" | "vocab" => Some(Self::Vocabulary),
            "pragmatics" => Some(Self::Pragmatics),
            "pronunciation" | "pron" => Some(Self::Pronunciation),
            _ => None,
        }
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of assessment item. Each kind carries a configurable discriminating
/// weight used when aggregating item scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    MultipleChoice,
    FreeText,
    AudioRead,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MultipleChoice => "multiple_choice",
            Self::FreeText => "free_text",
            Self::AudioRead => "audio_read",
        }
    }
}

/// A scored item response attributed to one domain.
///
/// Items that inform several domains produce one response per domain, each
/// with the item's share for that domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemResponse {
    pub item_id: String,
    pub item_type: ItemType,
    pub domain: Domain,
    /// Item score in [0,1]
    pub score: f64,
    /// Share of the item attributed to `domain`
    #[serde(default = "default_share")]
    pub share: f64,
}

const fn default_share() -> f64 {
    1.0
}

impl ItemResponse {
    pub fn new(item_id: impl Into<String>, item_type: ItemType, domain: Domain, score: f64) -> Self {
        Self {
            item_id: item_id.into(),
            item_type,
            domain,
            score,
            share: default_share(),
        }
    }

    pub fn with_share(mut self, share: f64) -> Self {
        self.share = share;
        self
    }
}

/// Aggregated signal for one domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainSignal {
    pub domain: Domain,
    /// Weighted mean of item scores, in [0,1]
    pub raw_score: f64,
    /// Sum of contributing item weights
    pub source_weight: f64,
    /// Confidence in [0,1]; grows with sample count, shrinks with variance
    pub confidence: f64,
    pub sample_count: usize,
    /// Weighted variance of the item scores around `raw_score`
    pub variance: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_round_trip_names() {
        for domain in Domain::ALL {
            assert_eq!(Domain::from_str(domain.as_str()), Some(domain));
        }
        assert_eq!(Domain::from_str("VOCAB"), Some(Domain::Vocabulary));
        assert!(Domain::from_str("listening").is_none());
    }

    #[test]
    fn test_item_response_default_share() {
        let json = r#"{"item_id":"q1","item_type":"free_text","domain":"grammar","score":0.5}"#;
        let response: ItemResponse = serde_json::from_str(json).unwrap();
        assert!((response.share - 1.0).abs() < f64::EPSILON);
        assert_eq!(response.item_type, ItemType::FreeText);
    }
}
