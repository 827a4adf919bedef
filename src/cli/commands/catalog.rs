//! Implementation of the `kospeak catalog` command.

use anyhow::Result;
use clap::Args;

use crate::cli::output::{list_table, output, render_list, truncate, CommandOutput};
use crate::cli::parse_domain;
use crate::domain::models::{Band, Goal};
use crate::services::{CurriculumTable, GoalCatalog, VersionedTable};

#[derive(Args, Debug)]
pub struct CatalogArgs {
    /// Only goals in this domain
    #[arg(long)]
    pub domain: Option<String>,

    /// Only goals whose band range covers this band
    #[arg(long)]
    pub band: Option<u8>,

    /// Show curriculum levels instead of goals
    #[arg(long)]
    pub levels: bool,

    /// Language of level descriptions (en, ko)
    #[arg(long, default_value = "en")]
    pub lang: String,
}

#[derive(Debug, serde::Serialize)]
pub struct CatalogOutput {
    pub version: u32,
    pub goals: Vec<Goal>,
}

impl CommandOutput for CatalogOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["id", "domain", "bands", "level", "prerequisites", "title"]);
        for goal in &self.goals {
            let prerequisites: Vec<String> = goal.prerequisites.iter().map(ToString::to_string).collect();
            table.add_row(vec![
                goal.id.to_string(),
                goal.domain.to_string(),
                format!("{}-{}", goal.band_range.low, goal.band_range.high),
                goal.curriculum_level.to_string(),
                prerequisites.join(", "),
                goal.title.clone(),
            ]);
        }
        format!(
            "Goal catalog v{}\n{}",
            self.version,
            render_list("goal", &table, self.goals.len())
        )
    }
}

#[derive(Debug, serde::Serialize)]
pub struct LevelRow {
    pub stage: Band,
    pub label: String,
    pub description: String,
}

#[derive(Debug, serde::Serialize)]
pub struct LevelsOutput {
    pub version: u32,
    pub levels: Vec<LevelRow>,
}

impl CommandOutput for LevelsOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["stage", "label", "description"]);
        for level in &self.levels {
            table.add_row(vec![
                level.stage.to_string(),
                level.label.clone(),
                truncate(&level.description, 80),
            ]);
        }
        format!("Curriculum v{}\n{table}", self.version)
    }
}

pub async fn execute(args: CatalogArgs, json_mode: bool) -> Result<()> {
    if args.levels {
        let curriculum = CurriculumTable::builtin()?;
        let levels = curriculum
            .levels()
            .iter()
            .map(|entry| {
                let described = curriculum.describe(entry.stage, &args.lang);
                LevelRow {
                    stage: entry.stage,
                    label: described.label,
                    description: described.description,
                }
            })
            .collect();
        output(
            &LevelsOutput {
                version: curriculum.version(),
                levels,
            },
            json_mode,
        );
        return Ok(());
    }

    let band = args
        .band
        .map(|b| Band::new(b).ok_or_else(|| anyhow::anyhow!("Band must be between 0 and 5, got {b}")))
        .transpose()?;
    let domain = args.domain.as_deref().map(parse_domain).transpose()?;

    let catalog = GoalCatalog::builtin()?;
    let goals = catalog
        .goals()
        .iter()
        .filter(|g| domain.is_none_or(|d| g.domain == d))
        .filter(|g| band.is_none_or(|b| g.band_range.contains(b)))
        .cloned()
        .collect();

    output(
        &CatalogOutput {
            version: catalog.version(),
            goals,
        },
        json_mode,
    );
    Ok(())
}
