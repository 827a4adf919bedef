//! Band estimation.
//!
//! Maps domain signals onto integer bands 0-5 and derives the global stage and
//! curriculum-equivalent level. Unscored domains never count as band 0: they
//! are left out of the stage, and too many of them fail the estimate.

use chrono::Utc;
use std::collections::BTreeMap;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AssessmentProfile, Band, Domain, DomainBand, ScoringConfig};
use crate::services::curriculum::CurriculumTable;
use crate::services::signal_normalizer::NormalizedSignals;
use crate::services::table_registry::VersionedTable;

/// Absorbs float noise so an exact .5 mean still rounds down.
const TIE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone)]
pub struct BandEstimator {
    config: ScoringConfig,
}

impl BandEstimator {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Highest band whose lower bound the score reaches.
    pub fn band_for(&self, raw_score: f64) -> Band {
        let bounds = &self.config.band_lower_bounds;
        let index = bounds
            .iter()
            .rposition(|lower| raw_score >= *lower)
            .unwrap_or(0);
        Band::clamped(index as i64)
    }

    /// Minimum number of scored domains: no more than half may be unscored.
    pub fn required_scored(total: usize) -> usize {
        total - total / 2
    }

    /// Weighted mean of scored bands, rounded half-down. `None` when nothing
    /// is scored.
    pub fn global_stage(&self, bands: &BTreeMap<Domain, DomainBand>) -> Option<Band> {
        let (weighted_sum, weight_total) = bands
            .iter()
            .filter_map(|(domain, band)| band.band().map(|b| (*domain, b)))
            .map(|(domain, band)| {
                let weight = self.config.domain_weight(domain).max(0.0);
                (weight * f64::from(band.value()), weight)
            })
            .fold((0.0, 0.0), |(s, t), (ws, w)| (s + ws, t + w));

        if weight_total <= 0.0 {
            return None;
        }

        let mean = weighted_sum / weight_total;
        let rounded = (mean - 0.5 - TIE_EPSILON).ceil();
        Some(Band::clamped(rounded as i64))
    }

    /// Build an immutable profile from normalized signals.
    pub fn estimate(
        &self,
        learner_id: &str,
        signals: &NormalizedSignals,
        curriculum: &CurriculumTable,
        supersedes: Option<Uuid>,
    ) -> DomainResult<AssessmentProfile> {
        if signals.signals.is_empty() {
            return Err(DomainError::IncompleteInput(Domain::ALL.to_vec()));
        }

        let mut bands = BTreeMap::new();
        for domain in Domain::ALL {
            let band = match signals.signals.get(&domain) {
                Some(signal) => DomainBand::Scored {
                    band: self.band_for(signal.raw_score),
                    raw_score: signal.raw_score,
                    confidence: signal.confidence,
                },
                None => DomainBand::Unscored,
            };
            debug!(domain = %domain, band = ?band.band(), "estimated domain band");
            bands.insert(domain, band);
        }

        let total = Domain::ALL.len();
        let scored: Vec<f64> = bands
            .values()
            .filter_map(|b| match b {
                DomainBand::Scored { confidence, .. } => Some(*confidence),
                DomainBand::Unscored => None,
            })
            .collect();

        let required = Self::required_scored(total);
        if scored.len() < required {
            return Err(DomainError::InsufficientCoverage {
                scored: scored.len(),
                total,
                required,
            });
        }

        let global_stage = self.global_stage(&bands).unwrap_or(Band::MIN);
        let coverage = scored.len() as f64 / total as f64;
        let confidence = (scored.iter().sum::<f64>() / scored.len() as f64 * coverage).clamp(0.0, 1.0);
        let curriculum_level = curriculum.level_for(global_stage);

        info!(
            learner_id,
            global_stage = global_stage.value(),
            level = %curriculum_level.label,
            confidence,
            unscored = total - scored.len(),
            "computed assessment profile"
        );

        Ok(AssessmentProfile {
            id: Uuid::new_v4(),
            learner_id: learner_id.to_string(),
            bands,
            global_stage,
            curriculum_level,
            confidence,
            curriculum_version: curriculum.version(),
            computed_at: Utc::now(),
            supersedes,
        })
    }
}
