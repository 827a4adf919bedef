//! Command-line interface for kospeak.

pub mod commands;
pub mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};

use crate::adapters::sqlite::initialize_configured_database;
use crate::domain::models::{Config, ContextTag, Domain};
use crate::infrastructure::config::ConfigLoader;

use commands::{
    assess::AssessArgs, catalog::CatalogArgs, goals::GoalsArgs, history::HistoryArgs,
    init::InitArgs, plan::PlanArgs, rehearse::RehearseArgs,
};

#[derive(Parser, Debug)]
#[command(name = "kospeak")]
#[command(about = "Diagnostic scoring and adaptive session planning for spoken Korean practice")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to .kospeak/config.yaml and .kospeak/local.yaml)
    #[arg(long, global = true, env = "KOSPEAK_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize kospeak configuration and database
    Init(InitArgs),

    /// Score a diagnostic and store the learner's profile
    Assess(AssessArgs),

    /// Select goals for the next session
    Goals(GoalsArgs),

    /// Plan a conversation session
    Plan(PlanArgs),

    /// Run a scripted end-to-end session and debrief
    Rehearse(RehearseArgs),

    /// Show a learner's practice history
    History(HistoryArgs),

    /// Browse the goal catalog and curriculum levels
    Catalog(CatalogArgs),
}

/// Load configuration from `path`, or from the project directory.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

/// Open the configured database, applying pending migrations.
pub async fn open_database(config: &Config) -> Result<SqlitePool> {
    initialize_configured_database(&config.database)
        .await
        .with_context(|| {
            format!(
                "Failed to open database at {}. Run 'kospeak init' first.",
                config.database.path
            )
        })
}

pub fn parse_context(s: &str) -> Result<ContextTag> {
    ContextTag::from_str(s).ok_or_else(|| {
        anyhow::anyhow!("Invalid context: {s}. Must be one of: school, work, travel, friends, daily_life, none")
    })
}

pub fn parse_domain(s: &str) -> Result<Domain> {
    Domain::from_str(s).ok_or_else(|| {
        anyhow::anyhow!("Invalid domain: {s}. Must be one of: grammar, vocabulary, pragmatics, pronunciation")
    })
}

/// Print an error in the requested format and exit with status 1.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let causes: Vec<String> = err.chain().skip(1).map(ToString::to_string).collect();
        let body = serde_json::json!({
            "success": false,
            "error": err.to_string(),
            "causes": causes,
        });
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("{} {err}", console::style("error:").red().bold());
        for cause in err.chain().skip(1) {
            eprintln!("  caused by: {cause}");
        }
    }
    std::process::exit(1)
}
