//! Implementation of the `kospeak history` command.

use anyhow::Result;
use clap::Args;

use crate::adapters::sqlite::SqliteHistoryRepository;
use crate::cli::open_database;
use crate::cli::output::{list_table, output, render_list, CommandOutput};
use crate::domain::models::{Config, GoalHistoryEntry};
use crate::domain::ports::ProgressHistoryRepository;

#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Learner identifier
    #[arg(short, long)]
    pub learner: String,

    /// Only show the most recent N sessions
    #[arg(long)]
    pub sessions: Option<usize>,
}

#[derive(Debug, serde::Serialize)]
pub struct HistoryOutput {
    pub learner_id: String,
    pub entries: Vec<GoalHistoryEntry>,
}

impl CommandOutput for HistoryOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["recorded", "session", "goal", "outcome"]);
        for entry in &self.entries {
            let session = entry.session_id.to_string();
            table.add_row(vec![
                entry.recorded_at.format("%Y-%m-%d %H:%M").to_string(),
                session[..8].to_string(),
                entry.goal_id.to_string(),
                entry.outcome.as_str().to_string(),
            ]);
        }
        render_list("record", &table, self.entries.len())
    }
}

pub async fn execute(args: HistoryArgs, config: &Config, json_mode: bool) -> Result<()> {
    let pool = open_database(config).await?;
    let repo = SqliteHistoryRepository::new(pool);

    let entries = match args.sessions {
        Some(limit) => repo.recent_sessions(&args.learner, limit).await?,
        None => repo.list_for_learner(&args.learner).await?,
    };

    output(
        &HistoryOutput {
            learner_id: args.learner,
            entries,
        },
        json_mode,
    );
    Ok(())
}
