//! Coaching engine: the public operations of the scoring and planning core.
//!
//! Everything except history access is synchronous and request-scoped. The
//! engine holds no per-learner or per-session state; callers own their
//! `SessionState` values.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    AssessmentProfile, Config, ContextTag, DebriefReport, Goal, GoalHistoryEntry, ItemResponse,
    ProfileDelta, RecognizedUtterance, SessionPlan, SessionState, TurnOutcome,
};
use crate::domain::ports::ProgressHistoryRepository;
use crate::services::band_estimator::BandEstimator;
use crate::services::curriculum::{CurriculumRegistry, CurriculumTable};
use crate::services::debrief_aggregator::DebriefAggregator;
use crate::services::elicitation_tracker::ElicitationTracker;
use crate::services::goal_catalog::{GoalCatalog, GoalCatalogRegistry};
use crate::services::goal_mapper::{GoalMapper, GoalRequest, ScoredGoal};
use crate::services::item_scorer::AssessmentBank;
use crate::services::session_planner::{ScenarioTemplates, SessionPlanner};
use crate::services::signal_normalizer::SignalNormalizer;
use crate::services::table_registry::VersionedTable;

pub struct CoachingEngine<H: ProgressHistoryRepository> {
    normalizer: SignalNormalizer,
    estimator: BandEstimator,
    mapper: GoalMapper,
    planner: SessionPlanner,
    tracker: ElicitationTracker,
    aggregator: DebriefAggregator,
    curricula: CurriculumRegistry,
    catalogs: GoalCatalogRegistry,
    require_complete_coverage: bool,
    history: Arc<H>,
}

impl<H: ProgressHistoryRepository> CoachingEngine<H> {
    /// Engine over the tables shipped with the crate.
    pub fn new(config: &Config, history: Arc<H>) -> DomainResult<Self> {
        Ok(Self::with_tables(
            config,
            history,
            CurriculumTable::builtin()?,
            GoalCatalog::builtin()?,
            ScenarioTemplates::builtin()?,
        ))
    }

    pub fn with_tables(
        config: &Config,
        history: Arc<H>,
        curriculum: CurriculumTable,
        catalog: GoalCatalog,
        templates: ScenarioTemplates,
    ) -> Self {
        Self {
            normalizer: SignalNormalizer::new(config.scoring.clone()),
            estimator: BandEstimator::new(config.scoring.clone()),
            mapper: GoalMapper::new(config.goals.clone()),
            planner: SessionPlanner::new(config.planner.clone(), templates),
            tracker: ElicitationTracker::new(config.tracker.clone()),
            aggregator: DebriefAggregator::new(config.debrief.clone()),
            curricula: CurriculumRegistry::new(curriculum),
            catalogs: GoalCatalogRegistry::new(catalog),
            require_complete_coverage: config.scoring.require_complete_coverage,
            history,
        }
    }

    pub fn curricula(&self) -> &CurriculumRegistry {
        &self.curricula
    }

    pub fn catalogs(&self) -> &GoalCatalogRegistry {
        &self.catalogs
    }

    /// Publish a newer curriculum table. Existing profiles keep the version
    /// they were computed with.
    pub fn publish_curriculum(&mut self, table: CurriculumTable) -> DomainResult<()> {
        let version = table.version();
        self.curricula.publish(table)?;
        info!(version, "published curriculum table");
        Ok(())
    }

    pub fn publish_catalog(&mut self, catalog: GoalCatalog) -> DomainResult<()> {
        let version = catalog.version();
        self.catalogs.publish(catalog)?;
        info!(version, "published goal catalog");
        Ok(())
    }

    /// Estimate an ability profile from scored items.
    pub fn compute_profile(
        &self,
        learner_id: &str,
        responses: &[ItemResponse],
    ) -> DomainResult<AssessmentProfile> {
        self.estimate(learner_id, responses, None)
    }

    /// Score raw answers against an assessment bank, then estimate.
    pub fn compute_profile_from_answers(
        &self,
        learner_id: &str,
        bank: &AssessmentBank,
        answers: &BTreeMap<String, String>,
    ) -> DomainResult<AssessmentProfile> {
        let responses = bank.score_responses(answers)?;
        self.compute_profile(learner_id, &responses)
    }

    /// Estimate a new profile that supersedes `previous`.
    pub fn reassess(
        &self,
        previous: &AssessmentProfile,
        responses: &[ItemResponse],
    ) -> DomainResult<(AssessmentProfile, ProfileDelta)> {
        let profile = self.estimate(&previous.learner_id, responses, Some(previous))?;
        let delta = ProfileDelta::between(previous, &profile);
        info!(
            learner_id = %profile.learner_id,
            previous = %previous.id,
            stage_delta = delta.stage,
            "reassessed learner"
        );
        Ok((profile, delta))
    }

    fn estimate(
        &self,
        learner_id: &str,
        responses: &[ItemResponse],
        previous: Option<&AssessmentProfile>,
    ) -> DomainResult<AssessmentProfile> {
        let signals = self.normalizer.normalize(responses)?;
        if self.require_complete_coverage && !signals.is_complete() {
            return Err(DomainError::IncompleteInput(signals.missing));
        }
        self.estimator.estimate(
            learner_id,
            &signals,
            self.curricula.active(),
            previous.map(|p| p.id),
        )
    }

    /// Goals for the next session, best first.
    pub fn select_goals(
        &self,
        profile: &AssessmentProfile,
        request: &GoalRequest,
        history: &[GoalHistoryEntry],
    ) -> DomainResult<Vec<Goal>> {
        self.mapper
            .select(profile, self.catalogs.active(), request, history)
    }

    /// Ranked candidates with score terms, for explaining a selection.
    pub fn explain_goals(
        &self,
        profile: &AssessmentProfile,
        request: &GoalRequest,
        history: &[GoalHistoryEntry],
    ) -> DomainResult<Vec<ScoredGoal>> {
        self.mapper.rank(profile, self.catalogs.active(), request, history)
    }

    /// Like `select_goals`, but an exhausted catalog yields the open
    /// conversation goal instead of an error.
    pub fn select_goals_or_open(
        &self,
        profile: &AssessmentProfile,
        request: &GoalRequest,
        history: &[GoalHistoryEntry],
    ) -> DomainResult<Vec<Goal>> {
        match self.select_goals(profile, request, history) {
            Err(DomainError::NoEligibleGoals(reason)) => {
                warn!(
                    learner_id = %profile.learner_id,
                    reason = %reason,
                    "no eligible goals, falling back to open conversation"
                );
                Ok(vec![Goal::open_conversation()])
            }
            other => other,
        }
    }

    /// Load the learner's history and select goals with fallback.
    pub async fn select_goals_for(
        &self,
        profile: &AssessmentProfile,
        request: &GoalRequest,
    ) -> DomainResult<Vec<Goal>> {
        let history = self.history.list_for_learner(&profile.learner_id).await?;
        self.select_goals_or_open(profile, request, &history)
    }

    pub fn plan_session(
        &self,
        goals: Vec<Goal>,
        context: ContextTag,
        duration_minutes: f64,
        seed: Option<u64>,
        profile: &AssessmentProfile,
    ) -> DomainResult<SessionPlan> {
        self.planner.plan(
            goals,
            context,
            duration_minutes,
            seed,
            profile,
            self.catalogs.active().version(),
        )
    }

    pub fn start_session(&self, plan: SessionPlan, profile: &AssessmentProfile) -> SessionState {
        info!(
            session_id = %plan.session_id,
            learner_id = %profile.learner_id,
            turn_budget = plan.turn_budget,
            "started session"
        );
        SessionState::new(plan, profile)
    }

    pub fn track_turn(
        &self,
        state: &mut SessionState,
        utterance: &RecognizedUtterance,
    ) -> DomainResult<TurnOutcome> {
        self.tracker.track_turn(state, utterance)
    }

    /// Close a session and append its history. Consumes the state.
    pub async fn finalize_debrief(&self, state: SessionState) -> DomainResult<DebriefReport> {
        let version = state.plan.catalog_version;
        let catalog = match self.catalogs.get(version) {
            Ok(catalog) => catalog,
            Err(e) => {
                warn!(version, error = %e, "plan catalog unknown, ranking with active catalog");
                self.catalogs.active()
            }
        };
        self.aggregator
            .finalize(state, catalog, self.history.as_ref())
            .await
    }

    pub async fn history_for(&self, learner_id: &str) -> DomainResult<Vec<GoalHistoryEntry>> {
        self.history.list_for_learner(learner_id).await
    }
}
