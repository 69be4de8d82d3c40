// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "kiln")]
#[command(about = "Inspect and maintain kiln reconciliation state")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print only final results
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Print JSON lines instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Stage to operate on (overrides config and KILN_STAGE)
    #[arg(short, long, global = true)]
    pub stage: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new kiln.yml configuration file
    Init {
        /// App name used as the scope prefix
        #[arg(long)]
        app: Option<String>,

        /// Overwrite an existing kiln.yml
        #[arg(long)]
        force: bool,
    },

    /// Inspect or edit recorded resource state
    State {
        #[command(subcommand)]
        command: StateCommands,
    },

    /// Break the run lock of the current scope
    Unlock,
}

#[derive(Subcommand)]
pub enum StateCommands {
    /// List recorded resources of the current scope
    List {
        /// List every scope with recorded state instead
        #[arg(long)]
        scopes: bool,
    },

    /// Show the recorded properties and output of a resource
    Show {
        /// Resource id
        id: String,
    },

    /// Drop a resource's record without invoking its handler
    Forget {
        /// Resource id
        id: String,
    },
}
