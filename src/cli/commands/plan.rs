//! Implementation of the `kospeak plan` command.

use anyhow::Result;
use clap::Args;
use std::sync::Arc;

use crate::adapters::sqlite::SqliteHistoryRepository;
use crate::cli::commands::{latest_profile, plan_for, SessionArgs};
use crate::cli::open_database;
use crate::cli::output::{heading, list_table, output, CommandOutput};
use crate::domain::models::{Config, SessionPlan};
use crate::services::CoachingEngine;

#[derive(Args, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub session: SessionArgs,
}

#[derive(Debug, serde::Serialize)]
pub struct PlanOutput {
    pub plan: SessionPlan,
}

/// Human rendering shared with `rehearse`.
pub fn describe_plan(plan: &SessionPlan) -> String {
    let mut table = list_table(&["goal", "domain", "patterns"]);
    for goal in &plan.goals {
        let patterns: Vec<&str> = goal.patterns.iter().map(|p| p.label.as_str()).collect();
        table.add_row(vec![
            goal.id.to_string(),
            goal.domain.to_string(),
            patterns.join(", "),
        ]);
    }

    [
        heading(&format!("Session {}", plan.session_id)),
        format!(
            "Scenario: {} ({}, {})",
            plan.scenario.setting, plan.scenario.role, plan.context
        ),
        format!(
            "Turns: {} over {:.1} min, correction density {}",
            plan.turn_budget,
            plan.duration_minutes,
            plan.correction_density.value()
        ),
        table.to_string(),
    ]
    .join("\n")
}

impl CommandOutput for PlanOutput {
    fn to_human(&self) -> String {
        format!("{}\nSeed: {}", describe_plan(&self.plan), self.plan.seed)
    }
}

pub async fn execute(args: PlanArgs, config: &Config, json_mode: bool) -> Result<()> {
    let pool = open_database(config).await?;
    let profile = latest_profile(&pool, &args.session.learner).await?;
    let engine = CoachingEngine::new(config, Arc::new(SqliteHistoryRepository::new(pool)))?;

    let plan = plan_for(&engine, &profile, &args.session).await?;
    output(&PlanOutput { plan }, json_mode);
    Ok(())
}
