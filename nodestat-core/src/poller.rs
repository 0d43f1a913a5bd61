//! Per-host polling pipeline and the sequential multi-host driver
//!
//! One poll is `open → collect → close → parse`. The session is closed
//! whether or not collection succeeded. Hosts are polled strictly one after
//! another; an authentication failure ends the run immediately.

use serde::{Deserialize, Serialize};
use tracing::Instrument;

use crate::config::NodestatConfig;
use crate::error::{NodestatError, NodestatResult};
use crate::probe::{ProbeExecutor, RawProbeOutput};
use crate::session::{Connector, Session, SshTarget};
use crate::stats::{StatsParser, StatsSnapshot};
use crate::tracing::span_names;

/// Handling of host failures other than authentication failures
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HostErrorPolicy {
    /// Stop the run and return the error
    #[default]
    Abort,
    /// Log the error and continue with the next host
    Skip,
}

/// Result of polling one host
#[derive(Debug, Clone, PartialEq)]
pub struct HostReport {
    /// Host label as configured
    pub host: String,
    /// Collected statistics
    pub snapshot: StatsSnapshot,
}

/// Counts for a finished run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Hosts that produced a report
    pub polled: usize,
    /// Hosts skipped after an error
    pub failed: usize,
}

/// Receives progress from [`Poller::run`]
pub trait PollObserver {
    /// Called before a host is contacted
    fn host_started(&mut self, _host: &str) {}

    /// Called with each successful report, in host order
    fn host_polled(&mut self, report: HostReport);

    /// Called when a host is skipped under [`HostErrorPolicy::Skip`]
    fn host_skipped(&mut self, _host: &str, _error: &NodestatError) {}
}

impl<F: FnMut(HostReport)> PollObserver for F {
    fn host_polled(&mut self, report: HostReport) {
        self(report);
    }
}

/// Polls hosts through a [`Connector`]
pub struct Poller<'a> {
    connector: &'a dyn Connector,
    executor: ProbeExecutor,
    remote_path: String,
    policy: HostErrorPolicy,
}

impl<'a> Poller<'a> {
    /// Creates a poller that aborts on the first host error
    #[must_use]
    pub fn new(
        connector: &'a dyn Connector,
        executor: ProbeExecutor,
        remote_path: impl Into<String>,
    ) -> Self {
        Self {
            connector,
            executor,
            remote_path: remote_path.into(),
            policy: HostErrorPolicy::default(),
        }
    }

    /// Creates a poller with the interpreter, remote path and error policy
    /// of `config`
    ///
    /// # Errors
    ///
    /// Returns [`NodestatError::Config`] if `config` does not validate.
    pub fn from_config(
        config: &NodestatConfig,
        connector: &'a dyn Connector,
    ) -> NodestatResult<Self> {
        config.validate()?;
        Ok(Self::new(
            connector,
            ProbeExecutor::new(config.python.as_str()),
            config.remote_path.as_str(),
        )
        .with_policy(config.host_error_policy))
    }

    /// Sets the host error policy
    #[must_use]
    pub const fn with_policy(mut self, policy: HostErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Current host error policy
    #[must_use]
    pub const fn policy(&self) -> HostErrorPolicy {
        self.policy
    }

    /// Polls one host. The session is closed before this returns.
    ///
    /// # Errors
    ///
    /// Returns the first session, transfer or parse error of the poll.
    pub async fn poll_host(&self, target: SshTarget) -> NodestatResult<HostReport> {
        let span = crate::trace_operation!(span_names::HOST_POLL, host = %target.host);

        async move {
            let host = target.host.clone();
            let mut session = Session::new(target, self.remote_path.as_str(), self.connector);

            let collected = self.collect(&mut session).await;
            session.close().await;

            let snapshot = StatsParser::parse(&collected?)?;
            tracing::debug!(
                users = snapshot.usernames.len(),
                heavy_processes = snapshot.heavy_processes.len(),
                "Host polled"
            );

            Ok(HostReport { host, snapshot })
        }
        .instrument(span)
        .await
    }

    async fn collect(&self, session: &mut Session<'_>) -> NodestatResult<RawProbeOutput> {
        session.open().await?;
        self.executor.collect(session).await
    }

    /// Polls every target in order and reports each result to `observer`.
    ///
    /// # Errors
    ///
    /// Returns an authentication failure as soon as it happens, without
    /// contacting further hosts. Other errors are returned under
    /// [`HostErrorPolicy::Abort`] and counted under [`HostErrorPolicy::Skip`].
    pub async fn run<O: PollObserver>(
        &self,
        targets: Vec<SshTarget>,
        observer: &mut O,
    ) -> NodestatResult<RunSummary> {
        let mut summary = RunSummary::default();

        for target in targets {
            let host = target.host.clone();
            tracing::info!(host = %host, "Now checking stats for {host} ...");
            observer.host_started(&host);

            match self.poll_host(target).await {
                Ok(report) => {
                    summary.polled += 1;
                    observer.host_polled(report);
                }
                Err(error) if error.is_fatal() => {
                    tracing::error!(host = %host, error = %error, "Aborting run");
                    return Err(error);
                }
                Err(error) => match self.policy {
                    HostErrorPolicy::Abort => return Err(error),
                    HostErrorPolicy::Skip => {
                        tracing::error!(host = %host, error = %error, "Skipping host");
                        summary.failed += 1;
                        observer.host_skipped(&host, &error);
                    }
                },
            }
        }

        tracing::info!(
            polled = summary.polled,
            failed = summary.failed,
            "Run finished"
        );
        Ok(summary)
    }
}

impl std::fmt::Debug for Poller<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("executor", &self.executor)
            .field("remote_path", &self.remote_path)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
