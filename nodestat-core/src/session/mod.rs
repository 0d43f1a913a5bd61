//! Remote session lifecycle
//!
//! A [`Session`] owns one authenticated SSH connection to a host together
//! with its file transfer and file management channels. The channels are
//! produced as a set by a [`Connector`], so the polling pipeline can run
//! against the real OpenSSH client programs or against an in-memory fake.

mod openssh;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use crate::error::{SessionError, SessionResult, TransferResult};
use crate::tracing::span_names;

pub use openssh::{OpenSshConnector, SSHPASS_WRONG_PASSWORD, classify_failure};

/// Default SSH port
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Default transport-level connect timeout (seconds)
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// How unknown host keys are treated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HostKeyPolicy {
    /// Trust any host key, including changed ones
    #[default]
    AcceptAll,
    /// Trust keys of hosts not yet in `known_hosts`, reject changed keys
    AcceptNew,
    /// Only connect to hosts already in `known_hosts`
    Strict,
}

impl HostKeyPolicy {
    /// Value for the `StrictHostKeyChecking` SSH option
    #[must_use]
    pub const fn ssh_option_value(self) -> &'static str {
        match self {
            Self::AcceptAll => "no",
            Self::AcceptNew => "accept-new",
            Self::Strict => "yes",
        }
    }
}

impl std::str::FromStr for HostKeyPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "accept-all" | "no" => Ok(Self::AcceptAll),
            "accept-new" => Ok(Self::AcceptNew),
            "strict" | "yes" => Ok(Self::Strict),
            other => Err(format!(
                "unknown host key policy `{other}` (expected accept-all, accept-new or strict)"
            )),
        }
    }
}

/// Everything needed to reach and authenticate against one host
#[derive(Clone)]
pub struct SshTarget {
    /// Hostname or IP address
    pub host: String,
    /// SSH port
    pub port: u16,
    /// Remote user name
    pub username: String,
    /// Password for the remote user
    pub password: SecretString,
    /// Transport connect timeout
    pub connect_timeout: Duration,
    /// Host key verification policy
    pub host_key_policy: HostKeyPolicy,
}

impl SshTarget {
    /// Creates a target with default port, timeout and host key policy
    #[must_use]
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: SecretString,
    ) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_SSH_PORT,
            username: username.into(),
            password,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            host_key_policy: HostKeyPolicy::default(),
        }
    }

    /// Sets the SSH port
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the connect timeout
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the host key policy
    #[must_use]
    pub const fn with_host_key_policy(mut self, policy: HostKeyPolicy) -> Self {
        self.host_key_policy = policy;
        self
    }

    /// `user@host` destination string
    #[must_use]
    pub fn destination(&self) -> String {
        format!("{}@{}", self.username, self.host)
    }
}

impl fmt::Debug for SshTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SshTarget")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("connect_timeout", &self.connect_timeout)
            .field("host_key_policy", &self.host_key_policy)
            .finish()
    }
}

/// Captured result of a remote command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit status of the remote command, if it exited normally
    pub exit_status: Option<i32>,
    /// Everything written to stdout
    pub stdout: String,
    /// Everything written to stderr
    pub stderr: String,
}

impl CommandOutput {
    /// Returns true if the command exited with status 0
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_status == Some(0)
    }

    /// Stdout split into lines, in order
    #[must_use]
    pub fn stdout_lines(&self) -> Vec<String> {
        self.stdout.lines().map(str::to_string).collect()
    }
}

/// Remote command execution channel
#[async_trait]
pub trait RemoteShell: Send {
    /// Runs `command` on the remote host and waits for it to exit
    async fn exec(&mut self, command: &str) -> SessionResult<CommandOutput>;

    /// Closes the channel
    async fn close(&mut self) -> SessionResult<()>;
}

/// File transfer channel
#[async_trait]
pub trait FileTransfer: Send {
    /// Writes `contents` to `remote_path` on the host
    async fn upload(&mut self, contents: &[u8], remote_path: &str) -> TransferResult<()>;

    /// Reads `remote_path` from the host
    async fn download(&mut self, remote_path: &str) -> TransferResult<Vec<u8>>;

    /// Closes the channel
    async fn close(&mut self) -> TransferResult<()>;
}

/// File management channel
#[async_trait]
pub trait FileManager: Send {
    /// Deletes `remote_path` on the host
    async fn remove(&mut self, remote_path: &str) -> TransferResult<()>;

    /// Closes the channel
    async fn close(&mut self) -> TransferResult<()>;
}

/// The three channels of an authenticated session
pub struct SessionChannels {
    /// Remote shell
    pub shell: Box<dyn RemoteShell>,
    /// File transfer
    pub transfer: Box<dyn FileTransfer>,
    /// File management
    pub files: Box<dyn FileManager>,
}

impl fmt::Debug for SessionChannels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionChannels").finish_non_exhaustive()
    }
}

/// Authenticates against a host and opens its channels
#[async_trait]
pub trait Connector: Send + Sync {
    /// Authenticates with the target's credentials and returns all three
    /// channels.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::AuthenticationFailed`] when the credentials are
    /// rejected and another [`SessionError`] for any other failure.
    async fn connect(&self, target: &SshTarget) -> SessionResult<SessionChannels>;
}

/// Connection state of a [`Session`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No connection
    Disconnected,
    /// Authentication in progress
    Connecting,
    /// Authenticated, channels open
    Connected,
    /// Authentication was rejected; the session cannot be reused
    Terminated,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Terminated => write!(f, "terminated"),
        }
    }
}

/// One host's connection plus its transfer and file management channels
pub struct Session<'a> {
    target: SshTarget,
    remote_path: String,
    connector: &'a dyn Connector,
    state: SessionState,
    channels: Option<SessionChannels>,
}

impl<'a> Session<'a> {
    /// Creates a disconnected session
    #[must_use]
    pub fn new(
        target: SshTarget,
        remote_path: impl Into<String>,
        connector: &'a dyn Connector,
    ) -> Self {
        Self {
            target,
            remote_path: remote_path.into(),
            connector,
            state: SessionState::Disconnected,
            channels: None,
        }
    }

    /// Host this session talks to
    #[must_use]
    pub fn host(&self) -> &str {
        &self.target.host
    }

    /// Remote working directory for uploaded files
    #[must_use]
    pub fn remote_path(&self) -> &str {
        &self.remote_path
    }

    /// Current connection state
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Returns true when the channels are open
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        matches!(self.state, SessionState::Connected)
    }

    /// Opens the session, or returns the existing channels if already open.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::AuthenticationFailed`] if the credentials are
    /// rejected (the session moves to [`SessionState::Terminated`]),
    /// [`SessionError::Terminated`] if a previous attempt was rejected, and
    /// any other connector error unchanged.
    pub async fn open(&mut self) -> SessionResult<&mut SessionChannels> {
        if self.state == SessionState::Terminated {
            return Err(SessionError::Terminated(self.target.host.clone()));
        }

        if self.channels.is_none() {
            let span = crate::trace_operation_debug!(
                span_names::SESSION_OPEN,
                host = %self.target.host,
                port = self.target.port
            );

            self.state = SessionState::Connecting;
            tracing::debug!(
                host = %self.target.host,
                username = %self.target.username,
                "Authenticating"
            );

            let result = self
                .connector
                .connect(&self.target)
                .instrument(span.clone())
                .await;
            let _guard = span.enter();

            match result {
                Ok(channels) => {
                    self.channels = Some(channels);
                    self.state = SessionState::Connected;
                    tracing::debug!("Session connected");
                }
                Err(err) if err.is_authentication_failure() => {
                    self.state = SessionState::Terminated;
                    tracing::error!(error = %err, "Authentication failed");
                    return Err(err);
                }
                Err(err) => {
                    self.state = SessionState::Disconnected;
                    return Err(err);
                }
            }
        }

        match self.channels.as_mut() {
            Some(channels) => Ok(channels),
            None => Err(SessionError::NotConnected(self.target.host.clone())),
        }
    }

    /// Remote shell channel
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotConnected`] before `open()` or after `close()`.
    pub fn shell(&mut self) -> SessionResult<&mut (dyn RemoteShell + 'static)> {
        match self.channels.as_mut() {
            Some(channels) => Ok(channels.shell.as_mut()),
            None => Err(SessionError::NotConnected(self.target.host.clone())),
        }
    }

    /// File transfer channel
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotConnected`] before `open()` or after `close()`.
    pub fn transfer(&mut self) -> SessionResult<&mut (dyn FileTransfer + 'static)> {
        match self.channels.as_mut() {
            Some(channels) => Ok(channels.transfer.as_mut()),
            None => Err(SessionError::NotConnected(self.target.host.clone())),
        }
    }

    /// File management channel
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotConnected`] before `open()` or after `close()`.
    pub fn files(&mut self) -> SessionResult<&mut (dyn FileManager + 'static)> {
        match self.channels.as_mut() {
            Some(channels) => Ok(channels.files.as_mut()),
            None => Err(SessionError::NotConnected(self.target.host.clone())),
        }
    }

    /// Closes all channels. Does nothing when nothing is open.
    pub async fn close(&mut self) {
        let Some(mut channels) = self.channels.take() else {
            return;
        };

        let span = crate::trace_operation_debug!(
            span_names::SESSION_CLOSE,
            host = %self.target.host
        );

        async move {
            if let Err(e) = channels.shell.close().await {
                tracing::warn!(error = %e, "Failed to close shell channel");
            }
            if let Err(e) = channels.transfer.close().await {
                tracing::warn!(error = %e, "Failed to close transfer channel");
            }
            if let Err(e) = channels.files.close().await {
                tracing::warn!(error = %e, "Failed to close file management channel");
            }
            tracing::debug!("Session closed");
        }
        .instrument(span)
        .await;

        if self.state == SessionState::Connected {
            self.state = SessionState::Disconnected;
        }
    }
}

impl fmt::Debug for Session<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("target", &self.target)
            .field("remote_path", &self.remote_path)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
