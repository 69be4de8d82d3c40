// ABOUTME: Entry point for the kiln CLI application.
// ABOUTME: Parses arguments, installs logging, and dispatches to command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands, StateCommands};
use commands::Project;
use kiln::config;
use kiln::error::Result;
use kiln::output::{Output, OutputMode};
use std::env;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins over the verbose flag
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let output = Output::new(OutputMode::from_flags(cli.quiet, cli.json));

    if let Err(e) = run(cli, &output).await {
        output.error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(cli: Cli, output: &Output) -> Result<()> {
    let cwd = env::current_dir()?;

    match cli.command {
        Commands::Init { app, force } => {
            config::init_config(&cwd, app.as_deref(), force)?;
            output.success(&format!("Created {}", config::CONFIG_FILENAME));
            Ok(())
        }
        Commands::State { command } => {
            let project = Project::open(&cwd, cli.stage.as_deref())?;
            match command {
                StateCommands::List { scopes: true } => {
                    commands::list_scopes(&project, output).await
                }
                StateCommands::List { scopes: false } => commands::list(&project, output).await,
                StateCommands::Show { id } => commands::show(&project, &id, output).await,
                StateCommands::Forget { id } => commands::forget(&project, &id, output).await,
            }
        }
        Commands::Unlock => {
            let project = Project::open(&cwd, cli.stage.as_deref())?;
            commands::unlock(&project, output).await
        }
    }
}
