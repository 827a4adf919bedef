//! Implementation of the `kospeak goals` command.

use anyhow::Result;
use clap::Args;
use std::sync::Arc;

use crate::adapters::sqlite::SqliteHistoryRepository;
use crate::cli::commands::latest_profile;
use crate::cli::output::{list_table, output, render_list, CommandOutput};
use crate::cli::{open_database, parse_context, parse_domain};
use crate::domain::models::{Config, Goal};
use crate::services::{CoachingEngine, GoalRequest, ScoredGoal};

#[derive(Args, Debug)]
pub struct GoalsArgs {
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

    /// Show every eligible candidate with its score terms
    #[arg(long)]
    pub explain: bool,
}

#[derive(Debug, serde::Serialize)]
pub struct GoalListOutput {
    pub learner_id: String,
    pub goals: Vec<Goal>,
}

impl CommandOutput for GoalListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["id", "domain", "bands", "title"]);
        for goal in &self.goals {
            table.add_row(vec![
                goal.id.to_string(),
                goal.domain.to_string(),
                format!("{}-{}", goal.band_range.low, goal.band_range.high),
                goal.title.clone(),
            ]);
        }
        render_list("goal", &table, self.goals.len())
    }
}

#[derive(Debug, serde::Serialize)]
pub struct ExplainOutput {
    pub learner_id: String,
    pub candidates: Vec<ScoredGoal>,
}

impl CommandOutput for ExplainOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&[
            "#", "id", "score", "recency", "progression", "context", "band", "recent",
        ]);
        for (rank, candidate) in self.candidates.iter().enumerate() {
            table.add_row(vec![
                (rank + 1).to_string(),
                candidate.goal.id.to_string(),
                format!("{:.3}", candidate.score),
                format!("{:.2}", candidate.recency_penalty),
                format!("{:.2}", candidate.progression_bonus),
                format!("{:.2}", candidate.context_affinity),
                candidate.matched_band.to_string(),
                if candidate.in_recency_window { "yes" } else { "" }.to_string(),
            ]);
        }
        render_list("candidate", &table, self.candidates.len())
    }
}

pub async fn execute(args: GoalsArgs, config: &Config, json_mode: bool) -> Result<()> {
    let pool = open_database(config).await?;
    let profile = latest_profile(&pool, &args.learner).await?;
    let engine = CoachingEngine::new(config, Arc::new(SqliteHistoryRepository::new(pool)))?;

    let mut request = GoalRequest::new(parse_context(&args.context)?, args.count);
    if let Some(focus) = &args.focus {
        request = request.with_focus_domain(parse_domain(focus)?);
    }

    if args.explain {
        let history = engine.history_for(&args.learner).await?;
        let candidates = engine.explain_goals(&profile, &request, &history)?;
        output(
            &ExplainOutput {
                learner_id: args.learner,
                candidates,
            },
            json_mode,
        );
        return Ok(());
    }

    let goals = engine.select_goals_for(&profile, &request).await?;
    output(
        &GoalListOutput {
            learner_id: args.learner,
            goals,
        },
        json_mode,
    );
    Ok(())
}
