use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "revolution")]
#[command(about = "Revolution - scripted automation sessions", long_about = None)]
pub struct Cli {
    /// Path to the engine config file
    #[arg(long, global = true, default_value = "config/revolution.yaml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run sessions until interrupted
    Run {
        /// Run only this account (default: every configured account)
        #[arg(short = 'a', long = "account")]
        account: Option<String>,

        /// Routine to redirect to once the sessions have started
        #[arg(short = 'r', long = "routine")]
        routine: Option<String>,
    },

    /// List registered routines
    Routines,

    /// Validate the config file and routine registry
    Check,
}
