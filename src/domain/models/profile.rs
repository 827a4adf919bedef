//! Assessment profile domain model.
//!
//! A profile is computed once from a diagnostic and never mutated. A later
//! reassessment produces a new profile that points back at the one it
//! supersedes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::signal::Domain;

/// Integer ability estimate on the 0–5 scale.
///
/// The global stage uses the same scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Band(u8);

impl Band {
    pub const MIN: Self = Self(0);
    pub const MAX: Self = Self(5);

    /// Number of distinct bands.
    pub const COUNT: usize = 6;

    pub const fn new(value: u8) -> Option<Self> {
        if value <= Self::MAX.0 {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Build a band from any integer, clamping into [0,5].
    pub fn clamped(value: i64) -> Self {
        Self(value.clamp(0, i64::from(Self::MAX.0)) as u8)
    }

    pub const fn value(self) -> u8 {
        self.0
    }

    /// The band directly below this one, if any.
    pub fn lower(self) -> Option<Self> {
        self.0.checked_sub(1).map(Self)
    }
}

impl TryFrom<u8> for Band {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("band {value} out of range 0-5"))
    }
}

impl From<Band> for u8 {
    fn from(band: Band) -> Self {
        band.0
    }
}

impl std::fmt::Display for Band {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Estimate for one domain: either a band or an explicit "not assessed"
/// marker. Unscored is never the same thing as band 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DomainBand {
    Scored {
        band: Band,
        raw_score: f64,
        confidence: f64,
    },
    Unscored,
}

impl DomainBand {
    pub fn band(&self) -> Option<Band> {
        match self {
            Self::Scored { band, .. } => Some(*band),
            Self::Unscored => None,
        }
    }

    pub fn is_scored(&self) -> bool {
        matches!(self, Self::Scored { .. })
    }
}

/// Curriculum-equivalent level resolved from the curriculum table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurriculumLevel {
    /// Position on the external ordinal scale
    pub ordinal: u8,
    /// Display label, e.g. "SKLC Level 2"
    pub label: String,
}

/// Immutable result of a diagnostic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentProfile {
    pub id: Uuid,
    pub learner_id: String,
    pub bands: BTreeMap<Domain, DomainBand>,
    pub global_stage: Band,
    pub curriculum_level: CurriculumLevel,
    /// Overall confidence in [0,1]
    pub confidence: f64,
    /// Curriculum table version active when this profile was computed
    pub curriculum_version: u32,
    pub computed_at: DateTime<Utc>,
    /// Profile this one replaces after a reassessment
    pub supersedes: Option<Uuid>,
}

impl AssessmentProfile {
    /// Band for a domain, `None` when the domain is unscored.
    pub fn band(&self, domain: Domain) -> Option<Band> {
        self.bands.get(&domain).and_then(DomainBand::band)
    }

    /// The band vector in canonical domain order.
    pub fn band_vector(&self) -> Vec<(Domain, Option<Band>)> {
        Domain::ALL.iter().map(|d| (*d, self.band(*d))).collect()
    }

    pub fn scored_domains(&self) -> Vec<Domain> {
        Domain::ALL
            .into_iter()
            .filter(|d| self.band(*d).is_some())
            .collect()
    }

    pub fn unscored_domains(&self) -> Vec<Domain> {
        Domain::ALL
            .into_iter()
            .filter(|d| self.band(*d).is_none())
            .collect()
    }
}

/// Band movement between two profiles of the same learner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileDelta {
    pub from: Option<Uuid>,
    pub to: Uuid,
    /// Per-domain band change; only domains scored in both profiles appear
    pub bands: BTreeMap<Domain, i8>,
    pub stage: i8,
}

impl ProfileDelta {
    /// Delta of a profile against itself: every scored domain at zero.
    pub fn unchanged(profile: &AssessmentProfile) -> Self {
        Self::unchanged_for(profile.id, &profile.scored_domains())
    }

    /// Zero delta for a profile known only by id and scored domains.
    pub fn unchanged_for(profile_id: Uuid, scored: &[Domain]) -> Self {
        Self {
            from: Some(profile_id),
            to: profile_id,
            bands: scored.iter().map(|d| (*d, 0)).collect(),
            stage: 0,
        }
    }

    pub fn between(previous: &AssessmentProfile, current: &AssessmentProfile) -> Self {
        let bands = Domain::ALL
            .into_iter()
            .filter_map(|d| match (previous.band(d), current.band(d)) {
                (Some(old), Some(new)) => Some((d, new.value() as i8 - old.value() as i8)),
                _ => None,
            })
            .collect();

        Self {
            from: Some(previous.id),
            to: current.id,
            bands,
            stage: current.global_stage.value() as i8 - previous.global_stage.value() as i8,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.stage == 0 && self.bands.values().all(|d| *d == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile_with(bands: &[(Domain, Option<u8>)], stage: u8) -> AssessmentProfile {
        AssessmentProfile {
            id: Uuid::new_v4(),
            learner_id: "learner".to_string(),
            bands: bands
                .iter()
                .map(|(d, b)| {
                    let value = match b {
                        Some(b) => DomainBand::Scored {
                            band: Band::new(*b).unwrap(),
                            raw_score: 0.5,
                            confidence: 0.5,
                        },
                        None => DomainBand::Unscored,
                    };
                    (*d, value)
                })
                .collect(),
            global_stage: Band::new(stage).unwrap(),
            curriculum_level: CurriculumLevel {
                ordinal: stage,
                label: format!("SKLC Level {stage}"),
            },
            confidence: 0.5,
            curriculum_version: 1,
            computed_at: Utc::now(),
            supersedes: None,
        }
    }

    #[test]
    fn test_band_range() {
        assert!(Band::new(5).is_some());
        assert!(Band::new(6).is_none());
        assert_eq!(Band::clamped(-3), Band::MIN);
        assert_eq!(Band::clamped(9), Band::MAX);
        assert_eq!(Band::MIN.lower(), None);
    }

    #[test]
    fn test_band_rejects_out_of_range_json() {
        assert!(serde_json::from_str::<Band>("7").is_err());
        assert_eq!(serde_json::from_str::<Band>("3").unwrap().value(), 3);
    }

    #[test]
    fn test_unscored_is_not_band_zero() {
        let profile = profile_with(
            &[(Domain::Grammar, Some(0)), (Domain::Pronunciation, None)],
            0,
        );
        assert_eq!(profile.band(Domain::Grammar), Some(Band::MIN));
        assert_eq!(profile.band(Domain::Pronunciation), None);
        assert!(profile.unscored_domains().contains(&Domain::Pronunciation));
    }

    #[test]
    fn test_delta_between_profiles() {
        let old = profile_with(&[(Domain::Grammar, Some(2)), (Domain::Vocabulary, None)], 2);
        let new = profile_with(&[(Domain::Grammar, Some(3)), (Domain::Vocabulary, Some(2))], 3);
        let delta = ProfileDelta::between(&old, &new);
        assert_eq!(delta.bands.get(&Domain::Grammar), Some(&1));
        assert!(!delta.bands.contains_key(&Domain::Vocabulary));
        assert_eq!(delta.stage, 1);
        assert!(!delta.is_zero());
        assert!(ProfileDelta::unchanged(&new).is_zero());
    }
}
