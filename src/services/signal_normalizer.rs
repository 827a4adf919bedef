//! Signal normalization.
//!
//! Collapses scored items into one weighted signal per domain. Each item
//! contributes with weight `item_type_weight x domain_share`.

use std::collections::BTreeMap;
use tracing::debug;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Domain, DomainSignal, ItemResponse, ScoringConfig};

/// Per-domain signals plus the domains that had no contributing item.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NormalizedSignals {
    pub signals: BTreeMap<Domain, DomainSignal>,
    pub missing: Vec<Domain>,
}

impl NormalizedSignals {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct SignalNormalizer {
    config: ScoringConfig,
}

impl SignalNormalizer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Reject scores outside [0,1], non-finite values and negative shares.
    pub fn validate(responses: &[ItemResponse]) -> DomainResult<()> {
        for response in responses {
            if !response.score.is_finite() || !(0.0..=1.0).contains(&response.score) {
                return Err(DomainError::InvalidInput(format!(
                    "item {} has score {} outside [0,1]",
                    response.item_id, response.score
                )));
            }
            if !response.share.is_finite() || response.share < 0.0 {
                return Err(DomainError::InvalidInput(format!(
                    "item {} has invalid domain share {}",
                    response.item_id, response.share
                )));
            }
        }
        Ok(())
    }

    /// Signal for one domain, or `IncompleteInput` when no item contributes.
    pub fn normalize_domain(
        &self,
        domain: Domain,
        responses: &[ItemResponse],
    ) -> DomainResult<DomainSignal> {
        Self::validate(responses)?;

        let weighted: Vec<(f64, f64)> = responses
            .iter()
            .filter(|r| r.domain == domain)
            .map(|r| (self.config.item_type_weight(r.item_type) * r.share, r.score))
            .filter(|(w, _)| *w > 0.0)
            .collect();

        let total_weight: f64 = weighted.iter().map(|(w, _)| w).sum();
        if weighted.is_empty() || total_weight <= 0.0 {
            return Err(DomainError::IncompleteInput(vec![domain]));
        }

        let mean = weighted.iter().map(|(w, s)| w * s).sum::<f64>() / total_weight;
        let variance = weighted
            .iter()
            .map(|(w, s)| w * (s - mean).powi(2))
            .sum::<f64>()
            / total_weight;

        let sample_count = weighted.len();
        let confidence = self.confidence(sample_count, variance);

        debug!(
            domain = %domain,
            raw_score = mean,
            sample_count,
            variance,
            confidence,
            "normalized domain signal"
        );

        Ok(DomainSignal {
            domain,
            raw_score: mean.clamp(0.0, 1.0),
            source_weight: total_weight,
            confidence,
            sample_count,
            variance,
        })
    }

    /// Signals for every domain. Domains without items are reported in
    /// `missing` rather than failing the whole call.
    pub fn normalize(&self, responses: &[ItemResponse]) -> DomainResult<NormalizedSignals> {
        Self::validate(responses)?;

        let mut normalized = NormalizedSignals::default();
        for domain in Domain::ALL {
            match self.normalize_domain(domain, responses) {
                Ok(signal) => {
                    normalized.signals.insert(domain, signal);
                }
                Err(DomainError::IncompleteInput(_)) => normalized.missing.push(domain),
                Err(e) => return Err(e),
            }
        }
        Ok(normalized)
    }

    /// `n/(n+prior) x (1 - 2 sigma)`, clipped to [0,1].
    fn confidence(&self, sample_count: usize, variance: f64) -> f64 {
        let n = sample_count as f64;
        let prior = self.config.confidence_prior.max(0.0);
        let sigma = variance.max(0.0).sqrt();
        (n / (n + prior) * (1.0 - 2.0 * sigma)).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ItemType;

    fn normalizer() -> SignalNormalizer {
        SignalNormalizer::new(ScoringConfig::default())
    }

    fn item(id: &str, domain: Domain, score: f64) -> ItemResponse {
        ItemResponse::new(id, ItemType::MultipleChoice, domain, score)
    }

    #[test]
    fn test_weighted_mean_uses_type_weights_and_shares() {
        let mut config = ScoringConfig::default();
        config.item_type_weights.insert(ItemType::FreeText, 3.0);
        let normalizer = SignalNormalizer::new(config);

        let responses = vec![
            item("mc", Domain::Grammar, 0.0),
            ItemResponse::new("text", ItemType::FreeText, Domain::Grammar, 1.0).with_share(0.5),
        ];
        let signal = normalizer.normalize_domain(Domain::Grammar, &responses).unwrap();
        // weights 1.0 and 1.5
        assert!((signal.raw_score - 0.6).abs() < 1e-9);
        assert!((signal.source_weight - 2.5).abs() < 1e-9);
        assert_eq!(signal.sample_count, 2);
    }

    #[test]
    fn test_missing_domain_is_incomplete() {
        let responses = vec![item("a", Domain::Grammar, 0.5)];
        let err = normalizer()
            .normalize_domain(Domain::Pronunciation, &responses)
            .unwrap_err();
        assert!(matches!(err, DomainError::IncompleteInput(ref d) if d == &[Domain::Pronunciation]));

        let all = normalizer().normalize(&responses).unwrap();
        assert_eq!(all.signals.len(), 1);
        assert_eq!(all.missing.len(), 3);
        assert!(!all.is_complete());
    }

    #[test]
    fn test_rejects_out_of_range_scores() {
        for score in [1.2, -0.1, f64::NAN] {
            let responses = vec![item("a", Domain::Grammar, score)];
            assert!(matches!(
                normalizer().normalize(&responses),
                Err(DomainError::InvalidInput(_))
            ));
        }
    }

    #[test]
    fn test_confidence_grows_with_samples_and_shrinks_with_spread() {
        let consistent: Vec<_> = (0..4).map(|i| item(&format!("c{i}"), Domain::Vocabulary, 0.5)).collect();
        let single = vec![item("s", Domain::Vocabulary, 0.5)];
        let spread = vec![
            item("lo", Domain::Vocabulary, 0.0),
            item("hi", Domain::Vocabulary, 1.0),
        ];

        let n = normalizer();
        let many = n.normalize_domain(Domain::Vocabulary, &consistent).unwrap();
        let one = n.normalize_domain(Domain::Vocabulary, &single).unwrap();
        let wide = n.normalize_domain(Domain::Vocabulary, &spread).unwrap();

        assert!((one.confidence - 0.5).abs() < 1e-9);
        assert!((many.confidence - 0.8).abs() < 1e-9);
        // sigma = 0.5 wipes out confidence
        assert!(wide.confidence.abs() < 1e-9);
    }

    #[test]
    fn test_zero_share_items_do_not_contribute() {
        let responses = vec![item("a", Domain::Pragmatics, 0.9).with_share(0.0)];
        assert!(normalizer().normalize_domain(Domain::Pragmatics, &responses).is_err());
    }
}
