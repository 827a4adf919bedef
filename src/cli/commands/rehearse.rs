//! Implementation of the `kospeak rehearse` command.
//!
//! Plays a whole session against scripted learner lines: plan, converse,
//! track every turn, then debrief and record history.

use anyhow::{Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::adapters::memory::InMemoryHistoryRepository;
use crate::adapters::scripted::{ScriptedAudio, ScriptedRecognizer, TemplateDialogue};
use crate::adapters::sqlite::SqliteHistoryRepository;
use crate::cli::commands::plan::describe_plan;
use crate::cli::commands::{latest_profile, plan_for, SessionArgs};
use crate::cli::open_database;
use crate::cli::output::{heading, list_table, output, truncate, CommandOutput};
use crate::domain::models::{AssessmentProfile, Config, DebriefReport, HighlightKind, SessionPlan};
use crate::domain::ports::ProgressHistoryRepository;
use crate::services::{CoachingEngine, SessionRunner, SessionTranscript};

#[derive(Args, Debug)]
pub struct RehearseArgs {
    #[command(flatten)]
    pub session: SessionArgs,

    /// File with one learner line per turn; blank lines and '#' comments are skipped
    #[arg(short, long)]
    pub script: PathBuf,

    /// Recognition confidence reported for every line
    #[arg(long, default_value_t = 0.9)]
    pub confidence: f64,

    /// Run the session without recording history
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, serde::Serialize)]
pub struct RehearseOutput {
    pub plan: SessionPlan,
    pub transcript: SessionTranscript,
    pub debrief: DebriefReport,
    pub recorded: bool,
}

impl CommandOutput for RehearseOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![describe_plan(&self.plan), String::new()];

        let mut turns = list_table(&["turn", "prompt", "learner", "usable", "pending"]);
        for turn in &self.transcript.turns {
            turns.add_row(vec![
                turn.outcome.turn.to_string(),
                turn.prompt.as_deref().map_or_else(|| "-".to_string(), |p| truncate(p, 40)),
                truncate(&turn.utterance.text, 40),
                if turn.outcome.usable { "yes" } else { "no" }.to_string(),
                turn.outcome.pending.len().to_string(),
            ]);
        }
        lines.push(turns.to_string());
        lines.push(format!("Stopped: {}", self.transcript.stop_reason.as_str()));
        lines.push(String::new());

        let debrief = &self.debrief;
        lines.push(heading("Debrief"));
        for goal in &debrief.goals_practiced {
            lines.push(format!(
                "  {} ({}): {} after {} attempt(s)",
                goal.title,
                goal.goal_id,
                goal.outcome.as_str(),
                goal.attempts
            ));
        }
        for highlight in debrief
            .pronunciation_highlights
            .iter()
            .chain(&debrief.pattern_highlights)
        {
            let marker = match highlight.kind {
                HighlightKind::Praise => "+",
                HighlightKind::Correction => "!",
            };
            lines.push(format!("  {marker} {}", highlight.message));
        }
        lines.push(debrief.progress_note.clone());
        if debrief.reassessment_suggested {
            lines.push("A reassessment is suggested.".to_string());
        }
        if !self.recorded {
            lines.push("(dry run, history not recorded)".to_string());
        }
        lines.join("\n")
    }
}

/// Learner lines from a script, skipping blanks and comments.
pub fn parse_script(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(ToString::to_string)
        .collect()
}

fn read_script(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read script {}", path.display()))?;
    let lines = parse_script(&text);
    if lines.is_empty() {
        anyhow::bail!("Script {} has no learner lines", path.display());
    }
    Ok(lines)
}

async fn rehearse_with<H: ProgressHistoryRepository>(
    engine: &CoachingEngine<H>,
    profile: &AssessmentProfile,
    args: &RehearseArgs,
    lines: Vec<String>,
) -> Result<(SessionPlan, SessionTranscript, DebriefReport)> {
    let plan = plan_for(engine, profile, &args.session).await?;

    // the learner stops once the script runs out
    let turns = u32::try_from(lines.len()).unwrap_or(u32::MAX);
    let runner = SessionRunner::new(
        Arc::new(TemplateDialogue::new()),
        Arc::new(ScriptedRecognizer::new(lines).with_confidence(args.confidence)),
        Arc::new(ScriptedAudio::limited(turns)),
    );

    let mut state = engine.start_session(plan.clone(), profile);
    let transcript = runner.run(engine, &mut state).await?;
    let debrief = engine.finalize_debrief(state).await?;
    Ok((plan, transcript, debrief))
}

pub async fn execute(args: RehearseArgs, config: &Config, json_mode: bool) -> Result<()> {
    if !(0.0..=1.0).contains(&args.confidence) {
        anyhow::bail!("Confidence must be between 0 and 1, got {}", args.confidence);
    }
    let lines = read_script(&args.script)?;

    let pool = open_database(config).await?;
    let profile = latest_profile(&pool, &args.session.learner).await?;
    let stored = SqliteHistoryRepository::new(pool);

    let (plan, transcript, debrief) = if args.dry_run {
        // select against the real history, record into a scratch copy
        let history = stored.list_for_learner(&args.session.learner).await?;
        let scratch = Arc::new(InMemoryHistoryRepository::with_entries(history));
        let engine = CoachingEngine::new(config, scratch)?;
        rehearse_with(&engine, &profile, &args, lines).await?
    } else {
        let engine = CoachingEngine::new(config, Arc::new(stored))?;
        rehearse_with(&engine, &profile, &args, lines).await?
    };

    output(
        &RehearseOutput {
            plan,
            transcript,
            debrief,
            recorded: !args.dry_run,
        },
        json_mode,
    );
    Ok(())
}
