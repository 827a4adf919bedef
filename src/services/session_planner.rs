//! Session planning.
//!
//! Turns selected goals into a parameterized conversation: turn budget,
//! correction density, a role-play scenario and the forms to elicit.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    AssessmentProfile, Band, ContextTag, CorrectionDensity, Domain, ElicitationTarget, Goal,
    PatternKind, PlannerConfig, Scenario, SessionPlan,
};
use crate::services::goal_mapper::MAX_GOALS_PER_SESSION;

const BUILTIN_TEMPLATES: &str = include_str!("../../data/scenario_templates_v1.yaml");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioTemplate {
    pub id: String,
    pub context: ContextTag,
    pub role: String,
    pub setting: String,
    /// Domains the scenario naturally exercises
    pub domains: Vec<Domain>,
}

impl ScenarioTemplate {
    /// How many of the given domains this template covers.
    pub fn coverage(&self, domains: &BTreeSet<Domain>) -> usize {
        domains.iter().filter(|d| self.domains.contains(d)).count()
    }

    fn to_scenario(&self) -> Scenario {
        Scenario {
            template_id: self.id.clone(),
            role: self.role.clone(),
            setting: self.setting.clone(),
        }
    }
}

/// Context-indexed scenario templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioTemplates {
    pub version: u32,
    pub templates: Vec<ScenarioTemplate>,
}

impl ScenarioTemplates {
    pub fn builtin() -> DomainResult<Self> {
        Self::from_yaml(BUILTIN_TEMPLATES)
    }

    pub fn from_yaml(yaml: &str) -> DomainResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Templates for a context, or the context-free ones when none exist.
    pub fn for_context(&self, context: ContextTag) -> Vec<&ScenarioTemplate> {
        let matching: Vec<_> = self.templates.iter().filter(|t| t.context == context).collect();
        if !matching.is_empty() {
            return matching;
        }
        self.templates
            .iter()
            .filter(|t| t.context == ContextTag::Unspecified)
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct SessionPlanner {
    config: PlannerConfig,
    templates: ScenarioTemplates,
}

impl SessionPlanner {
    pub fn new(config: PlannerConfig, templates: ScenarioTemplates) -> Self {
        Self { config, templates }
    }

    /// `floor(duration x 60 / average turn seconds)`
    pub fn turn_budget(&self, duration_minutes: f64) -> u32 {
        let seconds = self.config.average_turn_seconds;
        if !duration_minutes.is_finite() || duration_minutes <= 0.0 || seconds <= 0.0 {
            return 0;
        }
        (duration_minutes * 60.0 / seconds).floor() as u32
    }

    pub fn correction_density(&self, stage: Band) -> CorrectionDensity {
        let table = &self.config.correction_density_by_stage;
        CorrectionDensity::clamped(table[usize::from(stage.value()).min(table.len() - 1)])
    }

    /// Pick the template covering the most goal domains; ties are broken
    /// by `rng`.
    pub fn choose_scenario(
        &self,
        goals: &[Goal],
        context: ContextTag,
        rng: &mut ChaCha8Rng,
    ) -> DomainResult<Scenario> {
        let domains: BTreeSet<Domain> = goals.iter().map(|g| g.domain).collect();
        let candidates = self.templates.for_context(context);

        let best = candidates
            .iter()
            .map(|t| t.coverage(&domains))
            .max()
            .ok_or_else(|| {
                DomainError::Planning(format!("no scenario template for context {context}"))
            })?;
        let tied: Vec<&&ScenarioTemplate> = candidates
            .iter()
            .filter(|t| t.coverage(&domains) == best)
            .collect();

        let chosen = tied[rng.gen_range(0..tied.len())];
        Ok(chosen.to_scenario())
    }

    pub fn plan(
        &self,
        goals: Vec<Goal>,
        context: ContextTag,
        duration_minutes: f64,
        seed: Option<u64>,
        profile: &AssessmentProfile,
        catalog_version: u32,
    ) -> DomainResult<SessionPlan> {
        if goals.is_empty() {
            return Err(DomainError::Planning("no goals to plan".to_string()));
        }
        if goals.len() > MAX_GOALS_PER_SESSION {
            return Err(DomainError::Planning(format!(
                "{} goals requested, at most {MAX_GOALS_PER_SESSION} per session",
                goals.len()
            )));
        }
        let mut seen = HashSet::with_capacity(goals.len());
        for goal in &goals {
            if !seen.insert(&goal.id) {
                return Err(DomainError::Planning(format!(
                    "goal {} is planned more than once",
                    goal.id
                )));
            }
            check_goal(goal)?;
        }
        if !duration_minutes.is_finite() || duration_minutes <= 0.0 {
            return Err(DomainError::Planning(format!(
                "duration must be positive, got {duration_minutes}"
            )));
        }

        if duration_minutes < self.config.recommended_min_minutes
            || duration_minutes > self.config.recommended_max_minutes
        {
            warn!(
                duration_minutes,
                min = self.config.recommended_min_minutes,
                max = self.config.recommended_max_minutes,
                "session duration outside the recommended range"
            );
        }

        let turn_budget = self.turn_budget(duration_minutes);
        let required = self
            .config
            .min_turns
            .max(goals.len() as u32 * self.config.min_turns_per_goal);
        if turn_budget < required {
            return Err(DomainError::Planning(format!(
                "{duration_minutes} minutes gives {turn_budget} turns, {required} needed for {} goals",
                goals.len()
            )));
        }

        let seed = seed.unwrap_or_else(rand::random);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let scenario = self.choose_scenario(&goals, context, &mut rng)?;
        let correction_density = self.correction_density(profile.global_stage);

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
            context,
            scenario,
            targets,
            correction_density,
            turn_budget,
            duration_minutes,
            seed,
            catalog_version,
        };

        info!(
            session_id = %plan.session_id,
            goals = plan.goals.len(),
            template = %plan.scenario.template_id,
            turn_budget,
            correction_density = correction_density.value(),
            seed,
            "planned session"
        );
        Ok(plan)
    }
}

/// The checks a catalog applies, for goals handed straight to the planner.
fn check_goal(goal: &Goal) -> DomainResult<()> {
    goal.validate().map_err(DomainError::Planning)?;
    for pattern in goal
        .patterns
        .iter()
        .filter(|p| p.kind == PatternKind::Morphological)
    {
        for form in &pattern.forms {
            Regex::new(form).map_err(|e| {
                DomainError::Planning(format!(
                    "goal {} pattern '{}': {e}",
                    goal.id, pattern.label
                ))
            })?;
        }
    }
    Ok(())
}
