//! Post-session debrief.
//!
//! Ranks what went wrong and what went right in a finished session and turns
//! the elicitation records into history entries. Profile bands are never
//! touched here.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::info;

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    DebriefConfig, DebriefReport, ElicitationRecord, Goal, GoalHistoryEntry, GoalId,
    GoalOutcome, Highlight, HighlightKind, PracticedGoal, ProfileDelta, PronunciationNote,
    SessionState, Verdict,
};
use crate::domain::ports::ProgressHistoryRepository;
use crate::services::goal_catalog::GoalCatalog;

/// Hard upper bound on highlights per category.
pub const MAX_HIGHLIGHTS: usize = 3;

#[derive(Debug, Clone)]
pub struct DebriefAggregator {
    config: DebriefConfig,
}

impl DebriefAggregator {
    pub fn new(config: DebriefConfig) -> Self {
        Self { config }
    }

    fn cap(&self) -> usize {
        self.config.max_highlights.clamp(1, MAX_HIGHLIGHTS)
    }

    /// Tie-break key: catalog order, then plan order.
    fn order_key(state: &SessionState, catalog: &GoalCatalog, goal_id: Option<&GoalId>) -> (usize, usize) {
        match goal_id {
            Some(id) => (
                catalog.position(id).unwrap_or(usize::MAX),
                state.plan.goal_position(id).unwrap_or(usize::MAX),
            ),
            None => (usize::MAX, usize::MAX),
        }
    }

    /// Planned goals that carry patterns, with their records, in plan order.
    fn scored_records<'s>(state: &'s SessionState) -> Vec<(&'s Goal, &'s ElicitationRecord)> {
        state
            .plan
            .goals
            .iter()
            .filter(|g| !g.patterns.is_empty())
            .filter_map(|g| state.records.get(&g.id).map(|r| (g, r)))
            .collect()
    }

    pub fn pattern_highlights(&self, state: &SessionState, catalog: &GoalCatalog) -> Vec<Highlight> {
        let records = Self::scored_records(state);

        let praise = records
            .iter()
            .filter(|(_, r)| r.is_matched())
            .min_by(|(a, ra), (b, rb)| {
                rb.success_ratio()
                    .total_cmp(&ra.success_ratio())
                    .then_with(|| {
                        Self::order_key(state, catalog, Some(&a.id))
                            .cmp(&Self::order_key(state, catalog, Some(&b.id)))
                    })
            })
            .map(|(goal, record)| Highlight {
                goal_id: Some(goal.id.clone()),
                kind: HighlightKind::Praise,
                message: format!(
                    "Nice work on \"{}\": you used it in {} of {} attempts.",
                    goal.title, record.matched, record.attempts
                ),
                salience: 1.0 - record.success_ratio(),
            });

        let praised: Option<&GoalId> = praise.as_ref().and_then(|h| h.goal_id.as_ref());
        let mut corrections: Vec<Highlight> = records
            .iter()
            .filter(|(g, _)| Some(&g.id) != praised)
            .filter_map(|(goal, record)| {
                let salience = 1.0 - record.success_ratio();
                (salience > 0.0).then(|| Highlight {
                    goal_id: Some(goal.id.clone()),
                    kind: HighlightKind::Correction,
                    message: correction_message(goal, record),
                    salience,
                })
            })
            .collect();

        corrections.sort_by(|a, b| {
            b.salience.total_cmp(&a.salience).then_with(|| {
                Self::order_key(state, catalog, a.goal_id.as_ref())
                    .cmp(&Self::order_key(state, catalog, b.goal_id.as_ref()))
            })
        });

        let cap = self.cap();
        corrections.truncate(cap);
        if let Some(praise) = praise {
            if corrections.len() == cap {
                corrections.pop();
            }
            corrections.push(praise);
        }
        corrections
    }

    pub fn pronunciation_highlights(&self, state: &SessionState, catalog: &GoalCatalog) -> Vec<Highlight> {
        let mut notes: Vec<&PronunciationNote> = state.pronunciation_notes.iter().collect();
        notes.sort_by(|a, b| match b.severity.total_cmp(&a.severity) {
            Ordering::Equal => Self::order_key(state, catalog, a.goal_id.as_ref())
                .cmp(&Self::order_key(state, catalog, b.goal_id.as_ref())),
            other => other,
        });

        let mut seen = HashSet::new();
        notes
            .into_iter()
            .filter(|n| seen.insert(n.target.clone()))
            .take(self.cap())
            .map(|n| Highlight {
                goal_id: n.goal_id.clone(),
                kind: HighlightKind::Correction,
                message: format!("\"{}\" sounded like \"{}\".", n.target, n.heard),
                salience: n.severity,
            })
            .collect()
    }

    /// Build the report. Sessions never move bands, so the delta is zero in
    /// every domain the profile scored.
    pub fn aggregate(&self, state: &SessionState, catalog: &GoalCatalog) -> DebriefReport {
        let goals_practiced: Vec<PracticedGoal> = state
            .plan
            .goals
            .iter()
            .map(|goal| {
                let record = state.records.get(&goal.id);
                PracticedGoal {
                    goal_id: goal.id.clone(),
                    title: goal.title.clone(),
                    outcome: record.map_or(GoalOutcome::Attempted, ElicitationRecord::outcome),
                    attempts: record.map_or(0, |r| r.attempts),
                }
            })
            .collect();

        let patterned: Vec<&PracticedGoal> = goals_practiced
            .iter()
            .filter(|p| state.plan.goals.iter().any(|g| g.id == p.goal_id && !g.patterns.is_empty()))
            .collect();
        let succeeded = patterned
            .iter()
            .filter(|p| p.outcome == GoalOutcome::Succeeded)
            .count();

        let reassessment_suggested =
            self.config.suggest_reassessment && !patterned.is_empty() && succeeded == patterned.len();

        let progress_note = format!(
            "Practiced {} goal{} and reached {} of {}. Current level: {} (stage {}).",
            goals_practiced.len(),
            if goals_practiced.len() == 1 { "" } else { "s" },
            succeeded,
            patterned.len(),
            state.curriculum_level.label,
            state.global_stage
        );

        let profile_delta = ProfileDelta::unchanged_for(state.profile_id, &state.scored_domains);

        DebriefReport {
            session_id: state.session_id,
            learner_id: state.learner_id.clone(),
            goals_practiced,
            pronunciation_highlights: self.pronunciation_highlights(state, catalog),
            pattern_highlights: self.pattern_highlights(state, catalog),
            progress_note,
            profile_delta,
            reassessment_suggested,
            turns_taken: state.turns_taken,
            generated_at: Utc::now(),
        }
    }

    /// One entry per planned goal.
    pub fn history_entries(&self, state: &SessionState, recorded_at: DateTime<Utc>) -> Vec<GoalHistoryEntry> {
        state
            .plan
            .goals
            .iter()
            .map(|goal| {
                let outcome = state
                    .records
                    .get(&goal.id)
                    .map_or(GoalOutcome::Attempted, ElicitationRecord::outcome);
                GoalHistoryEntry::new(
                    state.learner_id.clone(),
                    state.session_id,
                    goal.id.clone(),
                    outcome,
                    recorded_at,
                )
            })
            .collect()
    }

    /// Close a session: build the report and append its history entries.
    /// Finalizing the same session twice appends twice.
    pub async fn finalize(
        &self,
        state: SessionState,
        catalog: &GoalCatalog,
        history: &dyn ProgressHistoryRepository,
    ) -> DomainResult<DebriefReport> {
        let report = self.aggregate(&state, catalog);
        let entries = self.history_entries(&state, report.generated_at);
        history.append_all(&entries).await?;

        info!(
            session_id = %report.session_id,
            learner_id = %report.learner_id,
            goals = report.goals_practiced.len(),
            pattern_highlights = report.pattern_highlights.len(),
            pronunciation_highlights = report.pronunciation_highlights.len(),
            reassessment_suggested = report.reassessment_suggested,
            "finalized debrief"
        );
        Ok(report)
    }
}

fn correction_message(goal: &Goal, record: &ElicitationRecord) -> String {
    let forms = goal
        .patterns
        .iter()
        .flat_map(|p| p.forms.iter().take(2))
        .cloned()
        .collect::<Vec<_>>()
        .join(", ");
    match record.best_verdict() {
        _ if record.attempts == 0 => format!(
            "\"{}\" did not come up this time. Try steering toward {forms}.",
            goal.title
        ),
        Verdict::Matched | Verdict::Partial => format!(
            "\"{}\" came out partly right in {} of {} attempts. Target forms: {forms}.",
            goal.title,
            record.matched + record.partial,
            record.attempts
        ),
        Verdict::NotAttempted => format!(
            "\"{}\" was not used in {} attempts. Target forms: {forms}.",
            goal.title, record.attempts
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryHistoryRepository;
    use std::collections::BTreeMap;
    use crate::domain::models::{
        AssessmentProfile, Band, BandRange, ContextTag, CorrectionDensity, CurriculumLevel,
        Domain, ElicitationTarget, Scenario, SessionPlan, TargetPattern, TurnVerdict,
    };
    use uuid::Uuid;

    fn goal(id: &str) -> Goal {
        Goal {
            id: GoalId::new(id),
            domain: Domain::Grammar,
            band_range: BandRange::new(Band::MIN, Band::MAX),
            curriculum_level: 2,
            title: format!("goal {id}"),
            patterns: vec![TargetPattern::lexical("form", &["요"])],
            prerequisites: Vec::new(),
            contexts: Vec::new(),
        }
    }

    fn catalog(ids: &[&str]) -> GoalCatalog {
        GoalCatalog::new(1, ids.iter().map(|id| goal(id)).collect()).unwrap()
    }

    fn state(goals: Vec<Goal>) -> SessionState {
        let targets = goals
            .iter()
            .map(|g| ElicitationTarget {
                goal_id: g.id.clone(),
                patterns: g.patterns.clone(),
            })
            .collect();
        let plan = SessionPlan {
            session_id: Uuid::new_v4(),
            goals,
            context: ContextTag::School,
            scenario: Scenario {
                template_id: "school-office-hours".to_string(),
                role: "professor".to_string(),
                setting: "office".to_string(),
            },
            targets,
            correction_density: CorrectionDensity::clamped(2),
            turn_budget: 12,
            duration_minutes: 8.0,
            seed: 3,
            catalog_version: 1,
        };
        let profile = AssessmentProfile {
            id: Uuid::new_v4(),
            learner_id: "learner".to_string(),
            bands: BTreeMap::new(),
            global_stage: Band::new(2).unwrap(),
            curriculum_level: CurriculumLevel {
                ordinal: 2,
                label: "SKLC Level 2".to_string(),
            },
            confidence: 1.0,
            curriculum_version: 1,
            computed_at: Utc::now(),
            supersedes: None,
        };
        SessionState::new(plan, &profile)
    }

    fn set_record(state: &mut SessionState, id: &str, matched: u32, partial: u32, unmatched: u32) {
        let record = state.records.get_mut(&GoalId::new(id)).unwrap();
        record.attempts = matched + partial + unmatched;
        record.matched = matched;
        record.partial = partial;
        record.unmatched = unmatched;
        let verdicts = std::iter::repeat(Verdict::Matched)
            .take(matched as usize)
            .chain(std::iter::repeat(Verdict::Partial).take(partial as usize))
            .chain(std::iter::repeat(Verdict::NotAttempted).take(unmatched as usize));
        record.verdicts = verdicts
            .enumerate()
            .map(|(i, verdict)| TurnVerdict { turn: i as u32 + 1, verdict })
            .collect();
    }

    fn aggregator() -> DebriefAggregator {
        DebriefAggregator::new(DebriefConfig::default())
    }

    #[test]
    fn test_outcomes_and_history_entries() {
        let mut state = state(vec![goal("a"), goal("b"), goal("c")]);
        set_record(&mut state, "a", 1, 0, 1);
        set_record(&mut state, "b", 0, 2, 0);

        let entries = aggregator().history_entries(&state, Utc::now());
        let outcomes: Vec<GoalOutcome> = entries.iter().map(|e| e.outcome).collect();
        assert_eq!(
            outcomes,
            vec![GoalOutcome::Succeeded, GoalOutcome::Partial, GoalOutcome::Attempted]
        );
        assert!(entries.iter().all(|e| e.session_id == state.session_id));
    }

    #[test]
    fn test_praise_replaces_lowest_correction_when_full() {
        let ids = ["a", "b", "c", "d"];
        let mut state = state(ids.iter().map(|id| goal(id)).collect());
        set_record(&mut state, "a", 0, 0, 2);
        set_record(&mut state, "b", 0, 1, 1);
        set_record(&mut state, "c", 0, 1, 0);
        set_record(&mut state, "d", 2, 0, 0);

        let highlights = aggregator().pattern_highlights(&state, &catalog(&ids));
        assert_eq!(highlights.len(), 3);
        let kinds: Vec<HighlightKind> = highlights.iter().map(|h| h.kind).collect();
        assert_eq!(
            kinds,
            vec![HighlightKind::Correction, HighlightKind::Correction, HighlightKind::Praise]
        );
        assert_eq!(highlights[0].goal_id, Some(GoalId::new("a")));
        assert_eq!(highlights[1].goal_id, Some(GoalId::new("b")));
        assert_eq!(highlights[2].goal_id, Some(GoalId::new("d")));
    }

    #[test]
    fn test_ties_follow_catalog_order() {
        let mut state = state(vec![goal("b"), goal("a")]);
        set_record(&mut state, "a", 0, 0, 1);
        set_record(&mut state, "b", 0, 0, 1);

        let highlights = aggregator().pattern_highlights(&state, &catalog(&["a", "b"]));
        let ids: Vec<&str> = highlights
            .iter()
            .filter_map(|h| h.goal_id.as_ref().map(GoalId::as_str))
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_pronunciation_highlights_ranked_and_capped() {
        let mut state = state(vec![goal("a")]);
        for (target, severity) in [("달", 0.4), ("딸", 0.9), ("탈", 0.6), ("어디", 0.7), ("딸", 0.95)] {
            state.pronunciation_notes.push(PronunciationNote {
                goal_id: Some(GoalId::new("a")),
                target: target.to_string(),
                heard: "?".to_string(),
                severity,
            });
        }
        let highlights = aggregator().pronunciation_highlights(&state, &catalog(&["a"]));
        let saliences: Vec<f64> = highlights.iter().map(|h| h.salience).collect();
        assert_eq!(saliences, vec![0.95, 0.7, 0.6]);
    }

    #[test]
    fn test_reassessment_suggested_when_everything_succeeded() {
        let mut state = state(vec![goal("a"), goal("b")]);
        set_record(&mut state, "a", 1, 0, 0);
        set_record(&mut state, "b", 1, 1, 0);
        let report = aggregator().aggregate(&state, &catalog(&["a", "b"]));
        assert!(report.reassessment_suggested);
        assert!(report.profile_delta.is_zero());
        assert!(report.progress_note.contains("SKLC Level 2"));

        set_record(&mut state, "b", 0, 1, 0);
        let report = aggregator().aggregate(&state, &catalog(&["a", "b"]));
        assert!(!report.reassessment_suggested);
    }

    #[test]
    fn test_highlights_are_stable() {
        let ids = ["a", "b", "c"];
        let mut state = state(ids.iter().map(|id| goal(id)).collect());
        set_record(&mut state, "a", 0, 1, 1);
        set_record(&mut state, "b", 2, 0, 0);
        set_record(&mut state, "c", 0, 0, 2);
        for (goal_id, target, severity) in [("a", "달", 0.45), ("b", "딸", 0.8), ("c", "탈", 0.6), ("a", "어디", 0.7)] {
            state.pronunciation_notes.push(PronunciationNote {
                goal_id: Some(GoalId::new(goal_id)),
                target: target.to_string(),
                heard: "?".to_string(),
                severity,
            });
        }
        let catalog = catalog(&ids);

        let first = aggregator().aggregate(&state, &catalog);
        let second = aggregator().aggregate(&state, &catalog);
        assert_eq!(first.pattern_highlights, second.pattern_highlights);
        assert_eq!(first.pronunciation_highlights, second.pronunciation_highlights);

        let mut reordered = state.clone();
        reordered.pronunciation_notes.reverse();
        let third = aggregator().aggregate(&reordered, &catalog);
        assert_eq!(first.pattern_highlights, third.pattern_highlights);
        assert_eq!(first.pronunciation_highlights, third.pronunciation_highlights);
    }

    #[test]
    fn test_delta_is_zero_over_scored_domains() {
        let mut state = state(vec![goal("a")]);
        state.scored_domains = vec![Domain::Grammar, Domain::Vocabulary];

        let delta = aggregator().aggregate(&state, &catalog(&["a"])).profile_delta;
        assert_eq!(delta.from, Some(state.profile_id));
        assert_eq!(delta.to, state.profile_id);
        assert_eq!(
            delta.bands,
            BTreeMap::from([(Domain::Grammar, 0), (Domain::Vocabulary, 0)])
        );
        assert!(delta.is_zero());
    }

    #[tokio::test]
    async fn test_finalizing_twice_appends_twice() {
        let repo = InMemoryHistoryRepository::new();
        let state = state(vec![goal("a"), goal("b")]);
        let catalog = catalog(&["a", "b"]);

        aggregator().finalize(state.clone(), &catalog, &repo).await.unwrap();
        aggregator().finalize(state.clone(), &catalog, &repo).await.unwrap();

        let entries = repo.list_for_session(state.session_id).await.unwrap();
        assert_eq!(entries.len(), 4);
    }
}
