use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};

use crate::cmd::{self, check::CheckArgs, filter::FilterArgs, play::PlayArgs};
use crate::logging;

#[derive(Parser, Debug)]
#[command(
    name = "formplayer",
    about = "Play and check formplayer forms from the terminal",
    version,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Session configuration file (TOML)
    #[arg(long = "config", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load a form from the server and answer it interactively
    Play(PlayArgs),
    /// Validate one raw answer offline
    Check(CheckArgs),
    /// Show which choices a combobox query keeps
    Filter(FilterArgs),
}

pub fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    match cli.command {
        Commands::Play(args) => cmd::play::run(args, cli.config.as_deref()),
        Commands::Check(args) => cmd::check::run(&args),
        Commands::Filter(args) => cmd::filter::run(&args),
    }
}
