//! `nodestat` - live CPU, memory, user and process statistics of remote hosts
//!
//! Uploads a small probe to each configured host over SSH, runs it, and
//! prints a colored table that grows as hosts report back.

mod cli;
mod error;
mod run;
mod table;

use clap::Parser;
use cli::Cli;
use nodestat_core::tracing::{TracingConfig, TracingLevel, TracingOutput, init_tracing};

/// Builds the logging setup from the flags. `RUST_LOG`, when set, replaces
/// the level chosen by `-v`/`-q`.
fn tracing_config(cli: &Cli, env_filter: Option<String>) -> TracingConfig {
    let level = if cli.quiet {
        TracingLevel::Error
    } else {
        TracingLevel::from_verbosity(cli.verbose)
    };

    let mut config = TracingConfig::new()
        .with_level(level)
        .with_ansi(!cli.no_color);
    if let Some(path) = &cli.log_file {
        config = config.with_output(TracingOutput::File { path: path.clone() });
    }
    if let Some(filter) = env_filter.filter(|f| !f.trim().is_empty()) {
        config = config.with_filter(filter);
    }
    config
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(&tracing_config(&cli, std::env::var("RUST_LOG").ok())) {
        eprintln!("Warning: failed to initialize logging: {e}");
    }

    if let Err(e) = run::run(&cli) {
        eprintln!("Error: {e}");
        std::process::exit(e.exit_code());
    }
}
