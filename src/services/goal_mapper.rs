//! Goal selection.
//!
//! Picks up to three practice goals for a profile. Selection is a pure
//! function of the profile, the request, the catalog and the learner's
//! history: same inputs, same goals, same order.
//!
//! Each eligible goal gets `score = recency_penalty - progression_bonus -
//! context_affinity` and the lowest scores win, ties going to catalog order.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::debug;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    AssessmentProfile, Band, ContextTag, Domain, Goal, GoalHistoryEntry, GoalId,
    GoalSelectionConfig,
};
use crate::services::goal_catalog::GoalCatalog;
use crate::services::table_registry::VersionedTable;

pub const MAX_GOALS_PER_SESSION: usize = 3;

/// What the caller wants practiced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GoalRequest {
    pub context: ContextTag,
    pub count: usize,
    /// Restrict selection to one domain
    pub focus_domain: Option<Domain>,
}

impl GoalRequest {
    pub fn new(context: ContextTag, count: usize) -> Self {
        Self {
            context,
            count,
            focus_domain: None,
        }
    }

    pub fn with_focus_domain(mut self, domain: Domain) -> Self {
        self.focus_domain = Some(domain);
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.count == 0 || self.count > MAX_GOALS_PER_SESSION {
            return Err(format!(
                "goal count must be between 1 and {MAX_GOALS_PER_SESSION}, got {}",
                self.count
            ));
        }
        Ok(())
    }
}

/// A candidate goal with the terms of its score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredGoal {
    pub goal: Goal,
    pub score: f64,
    pub recency_penalty: f64,
    pub progression_bonus: f64,
    pub context_affinity: f64,
    /// Band the goal was matched at; below the domain band after a fallback
    pub matched_band: Band,
    pub in_recency_window: bool,
}

/// Learner history indexed by session age (0 = most recent session).
#[derive(Debug, Default)]
struct HistoryView {
    /// Ages at which each goal was practiced
    practiced: HashMap<GoalId, Vec<usize>>,
    /// Age of the oldest satisfying outcome per goal
    first_satisfied: HashMap<GoalId, usize>,
}

impl HistoryView {
    fn build(learner_id: &str, history: &[GoalHistoryEntry]) -> Self {
        // Sessions ordered newest first by their latest entry; later
        // insertion wins a timestamp tie.
        let mut last_seen: HashMap<Uuid, (DateTime<Utc>, usize)> = HashMap::new();
        for (seq, entry) in history.iter().enumerate() {
            if entry.learner_id != learner_id {
                continue;
            }
            let key = (entry.recorded_at, seq);
            last_seen
                .entry(entry.session_id)
                .and_modify(|k| *k = (*k).max(key))
                .or_insert(key);
        }
        let mut sessions: Vec<(Uuid, (DateTime<Utc>, usize))> =
            last_seen.into_iter().collect();
        sessions.sort_by(|a, b| b.1.cmp(&a.1));
        let ages: HashMap<Uuid, usize> = sessions
            .iter()
            .enumerate()
            .map(|(age, (session, _))| (*session, age))
            .collect();

        let mut view = Self::default();
        for entry in history.iter().filter(|e| e.learner_id == learner_id) {
            let Some(&age) = ages.get(&entry.session_id) else {
                continue;
            };
            let practiced = view.practiced.entry(entry.goal_id.clone()).or_default();
            if !practiced.contains(&age) {
                practiced.push(age);
            }
            if entry.outcome.satisfies_prerequisite() {
                view.first_satisfied
                    .entry(entry.goal_id.clone())
                    .and_modify(|a| *a = (*a).max(age))
                    .or_insert(age);
            }
        }
        view
    }

    fn is_satisfied(&self, goal_id: &GoalId) -> bool {
        self.first_satisfied.contains_key(goal_id)
    }

    fn ever_practiced(&self, goal_id: &GoalId) -> bool {
        self.practiced.contains_key(goal_id)
    }

    fn ages_within(&self, goal_id: &GoalId, window: usize) -> impl Iterator<Item = usize> + '_ {
        self.practiced
            .get(goal_id)
            .into_iter()
            .flatten()
            .copied()
            .filter(move |age| *age < window)
    }

    /// Session age at which the last missing prerequisite became satisfied.
    fn unlocked_at(&self, goal: &Goal) -> Option<usize> {
        goal.prerequisites
            .iter()
            .map(|p| self.first_satisfied.get(p).copied())
            .collect::<Option<Vec<_>>>()?
            .into_iter()
            .min()
    }
}

#[derive(Debug, Clone)]
pub struct GoalMapper {
    config: GoalSelectionConfig,
}

impl GoalMapper {
    pub fn new(config: GoalSelectionConfig) -> Self {
        Self { config }
    }

    /// Select goals, best first.
    pub fn select(
        &self,
        profile: &AssessmentProfile,
        catalog: &GoalCatalog,
        request: &GoalRequest,
        history: &[GoalHistoryEntry],
    ) -> DomainResult<Vec<Goal>> {
        Ok(self
            .rank(profile, catalog, request, history)?
            .into_iter()
            .take(request.count)
            .map(|s| s.goal)
            .collect())
    }

    /// Every selectable candidate with its score terms, best first.
    pub fn rank(
        &self,
        profile: &AssessmentProfile,
        catalog: &GoalCatalog,
        request: &GoalRequest,
        history: &[GoalHistoryEntry],
    ) -> DomainResult<Vec<ScoredGoal>> {
        request.validate().map_err(DomainError::InvalidInput)?;

        let view = HistoryView::build(&profile.learner_id, history);
        let domains: Vec<Domain> = match request.focus_domain {
            Some(domain) => vec![domain],
            None => Domain::ALL.to_vec(),
        };

        let mut candidates = Vec::new();
        for domain in domains {
            let Some(band) = profile.band(domain) else {
                debug!(domain = %domain, "skipping unscored domain");
                continue;
            };
            candidates.extend(self.eligible_for_domain(catalog, &view, domain, band));
        }

        if candidates.is_empty() {
            return Err(DomainError::NoEligibleGoals(format!(
                "no goal in catalog v{} fits learner {}",
                catalog.version(),
                profile.learner_id
            )));
        }

        let window = self.config.recency_window_sessions.max(1);
        let mut scored: Vec<ScoredGoal> = candidates
            .into_iter()
            .map(|(goal, matched_band)| self.score(goal, matched_band, request.context, &view, window))
            .collect();

        if scored.iter().any(|s| !s.in_recency_window) {
            scored.retain(|s| !s.in_recency_window);
        }

        scored.sort_by(|a, b| {
            a.score
                .total_cmp(&b.score)
                .then_with(|| catalog.position(&a.goal.id).cmp(&catalog.position(&b.goal.id)))
        });

        for s in &scored {
            debug!(
                goal_id = %s.goal.id,
                score = s.score,
                recency = s.recency_penalty,
                progression = s.progression_bonus,
                context = s.context_affinity,
                "ranked goal"
            );
        }
        Ok(scored)
    }

    /// Goals eligible at the domain band, falling back one band at a time.
    fn eligible_for_domain<'c>(
        &self,
        catalog: &'c GoalCatalog,
        view: &HistoryView,
        domain: Domain,
        band: Band,
    ) -> Vec<(&'c Goal, Band)> {
        let mut current = Some(band);
        while let Some(b) = current {
            let eligible: Vec<(&Goal, Band)> = catalog
                .for_domain(domain)
                .filter(|g| g.band_range.contains(b))
                .filter(|g| g.prerequisites.iter().all(|p| view.is_satisfied(p)))
                .map(|g| (g, b))
                .collect();
            if !eligible.is_empty() {
                if b != band {
                    debug!(domain = %domain, band = band.value(), fallback = b.value(), "fell back to lower band");
                }
                return eligible;
            }
            current = b.lower();
        }
        Vec::new()
    }

    fn score(
        &self,
        goal: &Goal,
        matched_band: Band,
        context: ContextTag,
        view: &HistoryView,
        window: usize,
    ) -> ScoredGoal {
        let ages: HashSet<usize> = view.ages_within(&goal.id, window).collect();
        let recency_penalty = ages
            .iter()
            .map(|age| (window - age) as f64 / window as f64)
            .sum::<f64>()
            * self.config.recency_weight;

        let progression_window = self.config.progression_window_sessions.max(1);
        let progression_bonus = match view.unlocked_at(goal) {
            Some(age) if !view.ever_practiced(&goal.id) && age < progression_window => {
                (progression_window - age) as f64 / progression_window as f64
                    * self.config.progression_weight
            }
            _ => 0.0,
        };

        let context_affinity = if goal.fits_context(context) {
            self.config.context_weight
        } else {
            0.0
        };

        ScoredGoal {
            goal: goal.clone(),
            score: recency_penalty - progression_bonus - context_affinity,
            recency_penalty,
            progression_bonus,
            context_affinity,
            matched_band,
            in_recency_window: !ages.is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{
        BandRange, CurriculumLevel, DomainBand, GoalOutcome, TargetPattern,
    };
    use chrono::{Duration, TimeZone};
    use std::collections::BTreeMap;

    fn band(v: u8) -> Band {
        Band::new(v).unwrap()
    }

    fn goal(id: &str, domain: Domain, low: u8, high: u8, prerequisites: &[&str], contexts: &[ContextTag]) -> Goal {
        Goal {
            id: GoalId::new(id),
            domain,
            band_range: BandRange::new(band(low), band(high)),
            curriculum_level: low,
            title: id.to_string(),
            patterns: vec![TargetPattern::lexical("form", &["요"])],
            prerequisites: prerequisites.iter().map(|p| GoalId::new(*p)).collect(),
            contexts: contexts.to_vec(),
        }
    }

    fn profile(bands: &[(Domain, Option<u8>)]) -> AssessmentProfile {
        AssessmentProfile {
            id: Uuid::new_v4(),
            learner_id: "learner".to_string(),
            bands: bands
                .iter()
                .map(|(d, b)| {
                    let value = match b {
                        Some(b) => DomainBand::Scored {
                            band: band(*b),
                            raw_score: 0.5,
                            confidence: 0.5,
                        },
                        None => DomainBand::Unscored,
                    };
                    (*d, value)
                })
                .collect::<BTreeMap<_, _>>(),
            global_stage: band(2),
            curriculum_level: CurriculumLevel {
                ordinal: 2,
                label: "SKLC Level 2".to_string(),
            },
            confidence: 0.5,
            curriculum_version: 1,
            computed_at: Utc::now(),
            supersedes: None,
        }
    }

    /// One entry per (session, goal, outcome); sessions listed oldest first.
    fn history(sessions: &[&[(&str, GoalOutcome)]]) -> Vec<GoalHistoryEntry> {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
        let mut entries = Vec::new();
        for (i, goals) in sessions.iter().enumerate() {
            let session = Uuid::new_v4();
            for (goal_id, outcome) in goals.iter() {
                entries.push(GoalHistoryEntry::new(
                    "learner",
                    session,
                    GoalId::new(*goal_id),
                    *outcome,
                    start + Duration::days(i as i64),
                ));
            }
        }
        entries
    }

    fn ids(goals: &[Goal]) -> Vec<&str> {
        goals.iter().map(|g| g.id.as_str()).collect()
    }

    fn mapper() -> GoalMapper {
        GoalMapper::new(GoalSelectionConfig::default())
    }

    #[test]
    fn test_recently_practiced_goal_loses_to_fresh_goal() {
        let catalog = GoalCatalog::new(
            1,
            vec![
                goal("G7", Domain::Grammar, 2, 3, &[], &[]),
                goal("G9", Domain::Grammar, 2, 3, &[], &[]),
            ],
        )
        .unwrap();
        let profile = profile(&[(Domain::Grammar, Some(2)), (Domain::Vocabulary, Some(2))]);
        let history = history(&[
            &[("G7", GoalOutcome::Partial)],
            &[("G7", GoalOutcome::Succeeded)],
        ]);
        let request = GoalRequest::new(ContextTag::Unspecified, 2).with_focus_domain(Domain::Grammar);

        let goals = mapper().select(&profile, &catalog, &request, &history).unwrap();
        assert_eq!(ids(&goals), vec!["G9"]);
    }

    #[test]
    fn test_window_goals_allowed_when_nothing_fresh() {
        let catalog = GoalCatalog::new(1, vec![goal("G7", Domain::Grammar, 2, 3, &[], &[])]).unwrap();
        let profile = profile(&[(Domain::Grammar, Some(2))]);
        let history = history(&[&[("G7", GoalOutcome::Attempted)]]);

        let ranked = mapper()
            .rank(&profile, &catalog, &GoalRequest::new(ContextTag::Unspecified, 1), &history)
            .unwrap();
        assert_eq!(ranked.len(), 1);
        assert!(ranked[0].in_recency_window);
        assert!((ranked[0].recency_penalty - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_recency_decays_with_session_age() {
        let catalog = GoalCatalog::new(
            1,
            vec![
                goal("old", Domain::Grammar, 2, 3, &[], &[]),
                goal("new", Domain::Grammar, 2, 3, &[], &[]),
            ],
        )
        .unwrap();
        let profile = profile(&[(Domain::Grammar, Some(2))]);
        let history = history(&[&[("old", GoalOutcome::Attempted)], &[("new", GoalOutcome::Attempted)]]);

        let ranked = mapper()
            .rank(&profile, &catalog, &GoalRequest::new(ContextTag::Unspecified, 2), &history)
            .unwrap();
        assert_eq!(ranked[0].goal.id.as_str(), "old");
        assert!((ranked[0].recency_penalty - 0.9).abs() < 1e-9);
        assert!((ranked[1].recency_penalty - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_prerequisites_gate_eligibility() {
        let catalog = GoalCatalog::new(
            1,
            vec![
                goal("base", Domain::Grammar, 0, 1, &[], &[]),
                goal("next", Domain::Grammar, 1, 2, &["base"], &[]),
                goal("free", Domain::Grammar, 1, 2, &[], &[]),
            ],
        )
        .unwrap();
        let profile = profile(&[(Domain::Grammar, Some(1))]);
        let request = GoalRequest::new(ContextTag::Unspecified, 3);

        let goals = mapper().select(&profile, &catalog, &request, &[]).unwrap();
        assert_eq!(ids(&goals), vec!["base", "free"]);

        // an attempt alone does not satisfy the prerequisite
        let attempted = history(&[&[("base", GoalOutcome::Attempted)]]);
        let goals = mapper().select(&profile, &catalog, &request, &attempted).unwrap();
        assert_eq!(ids(&goals), vec!["free"]);

        let partial = history(&[&[("base", GoalOutcome::Partial)]]);
        let goals = mapper().select(&profile, &catalog, &request, &partial).unwrap();
        assert_eq!(ids(&goals), vec!["next", "free"]);
    }

    #[test]
    fn test_progression_bonus_for_newly_unlocked_goal() {
        let catalog = GoalCatalog::new(
            1,
            vec![
                goal("base", Domain::Grammar, 0, 3, &[], &[]),
                goal("plain", Domain::Grammar, 2, 3, &[], &[]),
                goal("next", Domain::Grammar, 2, 3, &["base"], &[]),
            ],
        )
        .unwrap();
        let profile = profile(&[(Domain::Grammar, Some(2))]);
        let mut config = GoalSelectionConfig::default();
        config.recency_window_sessions = 1;
        let mapper = GoalMapper::new(config);

        // base succeeded two sessions ago, then something else last session
        let history = history(&[
            &[("base", GoalOutcome::Succeeded)],
            &[("plain", GoalOutcome::Attempted)],
        ]);
        let ranked = mapper
            .rank(&profile, &catalog, &GoalRequest::new(ContextTag::Unspecified, 3), &history)
            .unwrap();
        assert_eq!(ranked[0].goal.id.as_str(), "next");
        // unlocked at age 1 of a 3-session window
        assert!((ranked[0].progression_bonus - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_context_affinity_breaks_catalog_order() {
        let catalog = GoalCatalog::new(
            1,
            vec![
                goal("a", Domain::Vocabulary, 2, 3, &[], &[ContextTag::Work]),
                goal("b", Domain::Vocabulary, 2, 3, &[], &[ContextTag::School]),
            ],
        )
        .unwrap();
        let profile = profile(&[(Domain::Vocabulary, Some(2))]);

        let goals = mapper()
            .select(&profile, &catalog, &GoalRequest::new(ContextTag::School, 1), &[])
            .unwrap();
        assert_eq!(ids(&goals), vec!["b"]);
    }

    #[test]
    fn test_falls_back_to_lower_band() {
        let catalog = GoalCatalog::new(1, vec![goal("low", Domain::Pronunciation, 0, 1, &[], &[])]).unwrap();
        let profile = profile(&[(Domain::Pronunciation, Some(4))]);

        let ranked = mapper()
            .rank(&profile, &catalog, &GoalRequest::new(ContextTag::Unspecified, 1), &[])
            .unwrap();
        assert_eq!(ranked[0].matched_band.value(), 1);
    }

    #[test]
    fn test_unscored_domain_yields_no_goals() {
        let catalog = GoalCatalog::new(1, vec![goal("p", Domain::Pronunciation, 0, 5, &[], &[])]).unwrap();
        let profile = profile(&[(Domain::Pronunciation, None), (Domain::Grammar, Some(2))]);

        let err = mapper()
            .select(&profile, &catalog, &GoalRequest::new(ContextTag::Unspecified, 1), &[])
            .unwrap_err();
        assert!(matches!(err, DomainError::NoEligibleGoals(_)));
    }

    #[test]
    fn test_rejects_bad_count() {
        let catalog = GoalCatalog::builtin().unwrap();
        let profile = profile(&[(Domain::Grammar, Some(2))]);
        for count in [0, 4] {
            let request = GoalRequest::new(ContextTag::Unspecified, count);
            assert!(matches!(
                mapper().select(&profile, &catalog, &request, &[]),
                Err(DomainError::InvalidInput(_))
            ));
        }
    }

    #[test]
    fn test_other_learners_history_is_ignored() {
        let catalog = GoalCatalog::new(
            1,
            vec![
                goal("a", Domain::Grammar, 2, 3, &[], &[]),
                goal("b", Domain::Grammar, 2, 3, &[], &[]),
            ],
        )
        .unwrap();
        let profile = profile(&[(Domain::Grammar, Some(2))]);
        let mut history = history(&[&[("a", GoalOutcome::Succeeded)]]);
        history[0].learner_id = "someone-else".to_string();

        let goals = mapper()
            .select(&profile, &catalog, &GoalRequest::new(ContextTag::Unspecified, 1), &history)
            .unwrap();
        assert_eq!(ids(&goals), vec!["a"]);
    }
}
