//! Implementation of the `kospeak assess` command.

use anyhow::{Context, Result};
use clap::Args;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

use crate::adapters::memory::InMemoryHistoryRepository;
use crate::adapters::sqlite::SqliteProfileRepository;
use crate::cli::open_database;
use crate::cli::output::{heading, list_table, output, CommandOutput};
use crate::domain::models::{AssessmentProfile, Config, Domain, DomainBand, ItemResponse, ProfileDelta};
use crate::domain::ports::ProfileRepository;
use crate::services::{AssessmentBank, CoachingEngine, VersionedTable};

#[derive(Args, Debug)]
pub struct AssessArgs {
    /// Learner identifier
    #[arg(short, long)]
    pub learner: String,

    /// YAML map of item id to the learner's raw answer
    #[arg(long, conflicts_with_all = ["scores", "show_items"], required_unless_present_any = ["scores", "show_items"])]
    pub answers: Option<PathBuf>,

    /// YAML or JSON list of already scored item responses
    #[arg(long)]
    pub scores: Option<PathBuf>,

    /// Assessment bank to score answers against (defaults to the built-in bank)
    #[arg(long)]
    pub bank: Option<PathBuf>,

    /// Supersede the learner's latest profile and report band changes
    #[arg(long)]
    pub reassess: bool,

    /// Language of the level description (en, ko)
    #[arg(long, default_value = "en")]
    pub lang: String,

    /// Compute the profile without storing it
    #[arg(long)]
    pub dry_run: bool,

    /// List the bank's items and exit
    #[arg(long)]
    pub show_items: bool,
}

#[derive(Debug, serde::Serialize)]
pub struct ProfileOutput {
    pub profile: AssessmentProfile,
    pub level_description: String,
    pub delta: Option<ProfileDelta>,
    pub stored: bool,
}

impl CommandOutput for ProfileOutput {
    fn to_human(&self) -> String {
        let p = &self.profile;
        let mut table = list_table(&["domain", "band", "raw score", "confidence"]);
        for domain in Domain::ALL {
            match p.bands.get(&domain) {
                Some(DomainBand::Scored {
                    band,
                    raw_score,
                    confidence,
                }) => {
                    table.add_row(vec![
                        domain.to_string(),
                        band.to_string(),
                        format!("{raw_score:.2}"),
                        format!("{confidence:.2}"),
                    ]);
                }
                _ => {
                    table.add_row(vec![domain.to_string(), "-".to_string(), "unscored".to_string(), "-".to_string()]);
                }
            }
        }

        let mut lines = vec![
            heading(&format!("Profile for {}", p.learner_id)),
            format!("ID: {}", p.id),
            table.to_string(),
            String::new(),
            format!("Stage: {} ({})", p.global_stage, p.curriculum_level.label),
            format!("Confidence: {:.2}", p.confidence),
            self.level_description.clone(),
        ];

        if let Some(delta) = &self.delta {
            let changes: Vec<String> = delta
                .bands
                .iter()
                .map(|(d, change)| format!("{d} {change:+}"))
                .collect();
            lines.push(format!("\nChange since last assessment: stage {:+}", delta.stage));
            if !changes.is_empty() {
                lines.push(format!("  {}", changes.join(", ")));
            }
        }
        if !self.stored {
            lines.push("\n(dry run, profile not stored)".to_string());
        }
        lines.join("\n")
    }
}

#[derive(Debug, serde::Serialize)]
pub struct ItemListOutput {
    pub version: u32,
    pub items: Vec<ItemSummary>,
}

#[derive(Debug, serde::Serialize)]
pub struct ItemSummary {
    pub id: String,
    pub prompt: String,
    pub item_type: String,
    pub domains: Vec<String>,
}

impl CommandOutput for ItemListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["id", "type", "domains", "prompt"]);
        for item in &self.items {
            table.add_row(vec![
                item.id.clone(),
                item.item_type.clone(),
                item.domains.join(", "),
                item.prompt.clone(),
            ]);
        }
        format!("Assessment bank v{}\n{table}", self.version)
    }
}

fn load_bank(path: Option<&Path>) -> Result<AssessmentBank> {
    match path {
        Some(path) => {
            let yaml = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Ok(AssessmentBank::from_yaml(&yaml)?)
        }
        None => Ok(AssessmentBank::builtin()?),
    }
}

/// Answers may be written as strings, numbers, booleans or lists of options.
fn answer_text(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Sequence(items) => items.iter().map(answer_text).collect::<Vec<_>>().join(", "),
        _ => String::new(),
    }
}

pub fn parse_answers(yaml: &str) -> Result<BTreeMap<String, String>> {
    let raw: BTreeMap<String, serde_yaml::Value> =
        serde_yaml::from_str(yaml).context("Answers must be a map of item id to answer")?;
    Ok(raw.into_iter().map(|(id, v)| (id, answer_text(&v))).collect())
}

fn load_responses(args: &AssessArgs, bank: &AssessmentBank) -> Result<Vec<ItemResponse>> {
    if let Some(path) = &args.scores {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        return serde_yaml::from_str(&text).context("Scores must be a list of item responses");
    }

    let path = args
        .answers
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("Either --answers or --scores is required"))?;
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(bank.score_responses(&parse_answers(&text)?)?)
}

pub async fn execute(args: AssessArgs, config: &Config, json_mode: bool) -> Result<()> {
    let bank = load_bank(args.bank.as_deref())?;

    if args.show_items {
        let items = bank
            .items
            .iter()
            .map(|item| ItemSummary {
                id: item.id.clone(),
                prompt: item.prompt.clone(),
                item_type: item.scoring.item_type().as_str().to_string(),
                domains: item.domains.keys().map(ToString::to_string).collect(),
            })
            .collect();
        output(&ItemListOutput { version: bank.version, items }, json_mode);
        return Ok(());
    }

    let responses = load_responses(&args, &bank)?;
    let engine = CoachingEngine::new(config, Arc::new(InMemoryHistoryRepository::new()))?;

    let pool = open_database(config).await?;
    let profiles = SqliteProfileRepository::new(pool);

    let previous = if args.reassess {
        let latest = profiles.latest_for_learner(&args.learner).await?;
        if latest.is_none() {
            warn!(learner_id = %args.learner, "no previous profile, running a first assessment");
        }
        latest
    } else {
        None
    };

    let (profile, delta) = match &previous {
        Some(previous) => {
            let (profile, delta) = engine.reassess(previous, &responses)?;
            (profile, Some(delta))
        }
        None => (engine.compute_profile(&args.learner, &responses)?, None),
    };

    if !args.dry_run {
        profiles.save(&profile).await.context("Failed to store profile")?;
    }

    let curriculum = engine.curricula().get(profile.curriculum_version)?;
    debug_assert_eq!(curriculum.version(), profile.curriculum_version);
    let description = curriculum.describe(profile.global_stage, &args.lang).description;

    output(
        &ProfileOutput {
            profile,
            level_description: description,
            delta,
            stored: !args.dry_run,
        },
        json_mode,
    );
    Ok(())
}
