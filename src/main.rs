//! Kospeak CLI entry point.

use clap::Parser;

use kospeak::cli::{commands, handle_error, load_config, Cli, Commands};
use kospeak::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => handle_error(err, cli.json),
    };

    // held for the life of the process so buffered file logs are flushed
    let _logger = match LogConfig::try_from(&config.logging).and_then(|c| LoggerImpl::init(&c)) {
        Ok(logger) => logger,
        Err(err) => handle_error(err, cli.json),
    };

    let result = match cli.command {
        Commands::Init(args) => commands::init::execute(args, &config, cli.json).await,
        Commands::Assess(args) => commands::assess::execute(args, &config, cli.json).await,
        Commands::Goals(args) => commands::goals::execute(args, &config, cli.json).await,
        Commands::Plan(args) => commands::plan::execute(args, &config, cli.json).await,
        Commands::Rehearse(args) => commands::rehearse::execute(args, &config, cli.json).await,
        Commands::History(args) => commands::history::execute(args, &config, cli.json).await,
        Commands::Catalog(args) => commands::catalog::execute(args, cli.json).await,
    };

    if let Err(err) = result {
        handle_error(err, cli.json);
    }
}
