//! Argument parsing for the kospeak command line.

use clap::Parser;
use std::path::PathBuf;

use kospeak::cli::{Cli, Commands};

#[test]
fn test_plan_defaults() {
    let cli = Cli::try_parse_from(["kospeak", "plan", "--learner", "mina"]).unwrap();
    let Commands::Plan(args) = cli.command else {
        panic!("expected plan command");
    };
    assert_eq!(args.session.learner, "mina");
    assert_eq!(args.session.context, "none");
    assert_eq!(args.session.count, 2);
    assert!((args.session.duration - 8.0).abs() < f64::EPSILON);
    assert!(args.session.goals.is_empty());
    assert!(args.session.seed.is_none());
}

#[test]
fn test_rehearse_requires_script() {
    assert!(Cli::try_parse_from(["kospeak", "rehearse", "-l", "mina"]).is_err());

    let cli = Cli::try_parse_from([
        "kospeak", "rehearse", "-l", "mina", "--script", "lines.txt", "-g", "G1", "-g", "V2",
        "--dry-run",
    ])
    .unwrap();
    let Commands::Rehearse(args) = cli.command else {
        panic!("expected rehearse command");
    };
    assert_eq!(args.script, PathBuf::from("lines.txt"));
    assert_eq!(args.session.goals, vec!["G1", "V2"]);
    assert!(args.dry_run);
}

#[test]
fn test_assess_answers_and_scores_conflict() {
    assert!(Cli::try_parse_from([
        "kospeak", "assess", "-l", "mina", "--answers", "a.yaml", "--scores", "s.yaml",
    ])
    .is_err());
    assert!(Cli::try_parse_from(["kospeak", "assess", "-l", "mina"]).is_err());
    assert!(Cli::try_parse_from(["kospeak", "assess", "-l", "mina", "--scores", "s.yaml"]).is_ok());
}

#[test]
fn test_catalog_filters() {
    let cli = Cli::try_parse_from(["kospeak", "catalog", "--domain", "grammar", "--band", "2", "--json"]).unwrap();
    assert!(cli.json);
    let Commands::Catalog(args) = cli.command else {
        panic!("expected catalog command");
    };
    assert_eq!(args.domain.as_deref(), Some("grammar"));
    assert_eq!(args.band, Some(2));
    assert!(!args.levels);
}

#[test]
fn test_config_flag_is_global() {
    let cli = Cli::try_parse_from([
        "kospeak", "history", "-l", "mina", "--sessions", "3", "--config", "custom.yaml",
    ])
    .unwrap();
    assert_eq!(cli.config, Some(PathBuf::from("custom.yaml")));
    let Commands::History(args) = cli.command else {
        panic!("expected history command");
    };
    assert_eq!(args.sessions, Some(3));
}
