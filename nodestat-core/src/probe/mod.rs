//! Probe deployment and execution
//!
//! The probe is a small Python script built on `psutil`. It is uploaded to
//! the host's remote path, run once, and removed again. A `ps` listing is
//! collected afterwards for the heavy-process column.

use tracing::Instrument;

use crate::error::NodestatResult;
use crate::session::{CommandOutput, Session};
use crate::tracing::span_names;

/// Source of the probe script
pub const PROBE_SCRIPT: &str = include_str!("probe.py");

/// File name the probe is uploaded as
pub const PROBE_FILE_NAME: &str = "nodestat_probe.py";

/// Interpreter used when none is configured
pub const DEFAULT_PYTHON: &str = "python3";

/// Process listing sorted by descending CPU, one `user,command,cpu` line per
/// process, no header
pub const PROCESS_LIST_COMMAND: &str = "ps -eo %U,%c,%C --sort=-%cpu --no-headers";

/// Raw text collected from one host
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawProbeOutput {
    /// Probe stdout, one entry per line
    pub probe_lines: Vec<String>,
    /// Process listing stdout, one entry per line
    pub process_lines: Vec<String>,
}

/// Quotes `s` for a POSIX shell
#[must_use]
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Location of the uploaded probe for a configured remote path.
///
/// An empty path or `~` means the login directory.
#[must_use]
pub fn remote_probe_path(remote_path: &str) -> String {
    let dir = remote_path.trim();
    let dir = if dir == "~" {
        ""
    } else {
        dir.strip_prefix("~/").unwrap_or(dir)
    };

    if dir.is_empty() {
        PROBE_FILE_NAME.to_string()
    } else {
        format!("{}/{PROBE_FILE_NAME}", dir.trim_end_matches('/'))
    }
}

/// Runs the measurement workflow against an open session
#[derive(Debug, Clone)]
pub struct ProbeExecutor {
    python: String,
}

impl Default for ProbeExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_PYTHON)
    }
}

impl ProbeExecutor {
    /// Creates an executor that runs the probe with `python`
    #[must_use]
    pub fn new(python: impl Into<String>) -> Self {
        Self {
            python: python.into(),
        }
    }

    /// Interpreter used to run the probe
    #[must_use]
    pub fn python(&self) -> &str {
        &self.python
    }

    /// Remote command line that runs the uploaded probe
    #[must_use]
    pub fn probe_command(&self, remote_probe: &str) -> String {
        format!("{} {}", self.python, shell_quote(remote_probe))
    }

    /// Uploads the probe, runs it, removes it, and lists processes.
    ///
    /// Removal is attempted whenever the upload succeeded, including when
    /// the probe itself could not be run. A failed removal is only logged.
    ///
    /// # Errors
    ///
    /// Returns a transfer error if the upload fails and a session error if
    /// either remote command cannot be run.
    pub async fn collect(&self, session: &mut Session<'_>) -> NodestatResult<RawProbeOutput> {
        let remote_probe = remote_probe_path(session.remote_path());
        let span = crate::trace_operation_debug!(
            span_names::PROBE_COLLECT,
            host = %session.host(),
            remote_path = %remote_probe
        );

        self.collect_steps(session, &remote_probe)
            .instrument(span)
            .await
    }

    async fn collect_steps(
        &self,
        session: &mut Session<'_>,
        remote_probe: &str,
    ) -> NodestatResult<RawProbeOutput> {
        if let Err(e) = session
            .transfer()?
            .upload(PROBE_SCRIPT.as_bytes(), remote_probe)
            .await
        {
            tracing::error!(error = %e, "Probe upload failed");
            return Err(e.into());
        }

        let executed = self.run_probe(session, remote_probe).await;

        match session.files() {
            Ok(files) => {
                if let Err(e) = files.remove(remote_probe).await {
                    tracing::warn!(error = %e, "Failed to remove probe from host");
                }
            }
            Err(e) => tracing::warn!(error = %e, "Cannot remove probe from host"),
        }

        let probe_lines = executed?;

        let listing = session.shell()?.exec(PROCESS_LIST_COMMAND).await?;
        if !listing.success() {
            tracing::warn!(
                exit_status = ?listing.exit_status,
                stderr = %listing.stderr.trim(),
                "Process listing failed, no heavy processes will be shown"
            );
        }
        let process_lines = listing.stdout_lines();

        tracing::trace!(
            line_count = probe_lines.len(),
            process_count = process_lines.len(),
            "Collected probe output"
        );

        Ok(RawProbeOutput {
            probe_lines,
            process_lines,
        })
    }

    async fn run_probe(
        &self,
        session: &mut Session<'_>,
        remote_probe: &str,
    ) -> NodestatResult<Vec<String>> {
        let command = self.probe_command(remote_probe);
        let output = session.shell()?.exec(&command).await?;
        log_nonzero_exit(&command, &output);

        for line in output.stdout.lines() {
            tracing::trace!(line, "Probe output");
        }

        Ok(output.stdout_lines())
    }
}

fn log_nonzero_exit(command: &str, output: &CommandOutput) {
    if !output.success() {
        tracing::warn!(
            command,
            exit_status = ?output.exit_status,
            stderr = %output.stderr.trim(),
            "Remote command exited with an error"
        );
    }
}
