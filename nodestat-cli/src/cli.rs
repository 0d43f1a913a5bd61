//! CLI argument parsing types using `clap`.

use std::path::PathBuf;

use clap::Parser;

/// Show CPU, memory, user and process statistics of remote hosts
#[derive(Parser, Debug)]
#[command(name = "nodestat")]
#[command(author, version, about = "Show live resource statistics of remote hosts over SSH")]
#[command(after_help = "The configuration file is either env-style (REMOTE_HOSTNAME_LIST, \
    REMOTE_USERNAME, REMOTE_PATH, ...) or TOML when its name ends in .toml. \
    Without CONFIG_FILE the platform config directory's nodestat/config.toml is used.")]
pub struct Cli {
    /// Configuration file
    #[arg(value_name = "CONFIG_FILE", env = "NODESTAT_CONFIG")]
    pub config_file: Option<String>,

    /// Poll only these hosts instead of the configured list
    #[arg(short = 'n', long = "name", value_name = "HOST", num_args = 1..)]
    pub names: Vec<String>,

    /// Leave out the per-core and process columns
    #[arg(short, long)]
    pub short: bool,

    /// Continue with the next host after a failure (authentication
    /// failures still stop the run)
    #[arg(short = 'k', long)]
    pub keep_going: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress progress messages and warnings
    #[arg(short, long)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, env = "NO_COLOR")]
    pub no_color: bool,

    /// Print each table below the previous one instead of clearing the screen
    #[arg(long)]
    pub no_clear: bool,

    /// Write logs to this file instead of stderr
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}
