//! CLI command implementations.

pub mod assess;
pub mod catalog;
pub mod goals;
pub mod history;
pub mod init;
pub mod plan;
pub mod rehearse;

use anyhow::{Context, Result};
use clap::Args;
use sqlx::SqlitePool;

use crate::adapters::sqlite::SqliteProfileRepository;
use crate::cli::{parse_context, parse_domain};
use crate::domain::models::{AssessmentProfile, Goal, GoalId, SessionPlan};
use crate::domain::ports::{ProfileRepository, ProgressHistoryRepository};
use crate::services::{CoachingEngine, GoalRequest};

/// Goal selection and planning options shared by `plan` and `rehearse`.
#[derive(Args, Debug, Clone)]
pub struct SessionArgs {
    /// Learner identifier
    #[arg(short, long)]
    pub learner: String,

    /// Conversation context (school, work, travel, friends, daily_life, none)
    #[arg(short, long, default_value = "none")]
    pub context: String,

    /// Number of goals to select (1-3)
    #[arg(short = 'n', long, default_value_t = 2)]
    pub count: usize,

    /// Restrict selection to one domain
    #[arg(long)]
    pub focus: Option<String>,

    /// Practice these catalog goals instead of selecting
    #[arg(short, long = "goal")]
    pub goals: Vec<String>,

    /// Session length in minutes
    #[arg(short, long, default_value_t = 8.0)]
    pub duration: f64,

    /// Seed for the scenario tie-break
    #[arg(long)]
    pub seed: Option<u64>,
}

impl SessionArgs {
    pub fn goal_request(&self) -> Result<GoalRequest> {
        let mut request = GoalRequest::new(parse_context(&self.context)?, self.count);
        if let Some(focus) = &self.focus {
            request = request.with_focus_domain(parse_domain(focus)?);
        }
        Ok(request)
    }
}

/// Latest stored profile for a learner.
pub async fn latest_profile(pool: &SqlitePool, learner: &str) -> Result<AssessmentProfile> {
    SqliteProfileRepository::new(pool.clone())
        .latest_for_learner(learner)
        .await
        .context("Failed to load profile")?
        .ok_or_else(|| {
            anyhow::anyhow!("No profile for learner '{learner}'. Run 'kospeak assess' first.")
        })
}

/// Resolve explicit goal ids against the active catalog, or select goals
/// from the learner's history.
pub async fn resolve_goals<H: ProgressHistoryRepository>(
    engine: &CoachingEngine<H>,
    profile: &AssessmentProfile,
    args: &SessionArgs,
) -> Result<Vec<Goal>> {
    if args.goals.is_empty() {
        let request = args.goal_request()?;
        return Ok(engine.select_goals_for(profile, &request).await?);
    }

    let catalog = engine.catalogs().active();
    args.goals
        .iter()
        .map(|id| {
            catalog
                .get(&GoalId::new(id.as_str()))
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("Unknown goal: {id}"))
        })
        .collect()
}

/// Select (or resolve) goals and plan a session for the learner.
pub async fn plan_for<H: ProgressHistoryRepository>(
    engine: &CoachingEngine<H>,
    profile: &AssessmentProfile,
    args: &SessionArgs,
) -> Result<SessionPlan> {
    let goals = resolve_goals(engine, profile, args).await?;
    let plan = engine.plan_session(
        goals,
        parse_context(&args.context)?,
        args.duration,
        args.seed,
        profile,
    )?;
    Ok(plan)
}
