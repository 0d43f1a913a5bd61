//! The polling run: config resolution, password prompt and live table.

use std::io::{IsTerminal, Write};
use std::path::PathBuf;

use nodestat_core::{
    DisplayRow, HostErrorPolicy, HostReport, NodestatConfig, NodestatError, OpenSshConnector,
    PollObserver, Poller, StatsPresenter, default_config_path, expand_path,
};
use secrecy::SecretString;

use crate::cli::Cli;
use crate::error::CliError;
use crate::table;

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// Resolves the configuration file path from the argument or the default location
fn config_path(arg: Option<&str>) -> Result<PathBuf, CliError> {
    match arg {
        Some(raw) => Ok(expand_path(raw)),
        None => default_config_path().ok_or_else(|| {
            CliError::Config("no configuration file given and no config directory found".into())
        }),
    }
}

/// Loads the configuration and applies the command-line overrides
pub fn load_config(cli: &Cli) -> Result<NodestatConfig, CliError> {
    let path = config_path(cli.config_file.as_deref())?;
    tracing::debug!(path = %path.display(), "Loading configuration");

    let mut config = NodestatConfig::load(&path)?;
    if !cli.names.is_empty() {
        config = config.with_hosts(cli.names.clone());
    }
    if cli.keep_going {
        config.host_error_policy = HostErrorPolicy::Skip;
    }
    config.validate()?;
    Ok(config)
}

fn prompt_password(username: &str) -> SecretString {
    match rpassword::prompt_password(format!("Password for remote user {username}: ")) {
        Ok(password) => SecretString::from(password),
        Err(e) => {
            tracing::warn!(error = %e, "Could not read password, trying without one");
            SecretString::from(String::new())
        }
    }
}

/// Redraws the table of every host polled so far
struct TableDisplay {
    rows: Vec<DisplayRow>,
    short: bool,
    color: bool,
    clear: bool,
    quiet: bool,
}

impl TableDisplay {
    fn new(cli: &Cli) -> Self {
        let terminal = std::io::stdout().is_terminal();
        Self {
            rows: Vec::new(),
            short: cli.short,
            color: !cli.no_color,
            clear: terminal && !cli.no_clear,
            quiet: cli.quiet,
        }
    }

    fn redraw(&self) {
        let rendered = table::render(&StatsPresenter::headers(self.short), &self.rows, self.color);
        let prefix = if self.clear { CLEAR_SCREEN } else { "" };
        let mut stdout = std::io::stdout().lock();
        let written = write!(stdout, "{prefix}{rendered}");
        if let Err(e) = written.and_then(|()| stdout.flush()) {
            tracing::warn!(error = %e, "Failed to write table");
        }
    }
}

impl PollObserver for TableDisplay {
    fn host_started(&mut self, host: &str) {
        if !self.quiet {
            println!("Now checking stats for {host} ...");
        }
    }

    fn host_polled(&mut self, report: HostReport) {
        self.rows
            .push(StatsPresenter::build_row(&report.host, &report.snapshot, self.short));
        self.redraw();
    }

    fn host_skipped(&mut self, host: &str, error: &NodestatError) {
        if !self.quiet {
            eprintln!("Skipping {host}: {error}");
        }
    }
}

/// Polls every configured host and prints the table as rows arrive
pub fn run(cli: &Cli) -> Result<(), CliError> {
    let config = load_config(cli)?;
    let password = prompt_password(&config.username);
    let targets = config.targets(&password);

    let connector = OpenSshConnector::new();
    let poller = Poller::from_config(&config, &connector)?;
    let mut display = TableDisplay::new(cli);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let summary = runtime.block_on(poller.run(targets, &mut display))?;

    if summary.failed > 0 && !cli.quiet {
        eprintln!(
            "{} of {} hosts could not be polled",
            summary.failed,
            summary.polled + summary.failed
        );
    }
    Ok(())
}
