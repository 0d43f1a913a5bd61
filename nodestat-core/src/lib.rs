//! `nodestat` Core Library
//!
//! Collects CPU, memory, user and process statistics from remote hosts over
//! SSH and turns them into display rows.
//!
//! # Crate Structure
//!
//! - [`session`] - Session lifecycle and the OpenSSH-backed channels
//! - [`probe`] - Probe upload, execution and cleanup
//! - [`stats`] - Snapshot model and output parser
//! - [`presenter`] - Row and header building with emphasis
//! - [`poller`] - Per-host pipeline and the sequential driver
//! - [`config`] - Env-style and TOML configuration
//! - [`error`] - Error types
//! - [`tracing`] - Logging setup

// Enable missing_docs warning for public API documentation
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod poller;
pub mod presenter;
pub mod probe;
pub mod session;
pub mod stats;
pub mod tracing;

pub use config::{NodestatConfig, default_config_path, expand_path};
pub use error::{
    ConfigError, ConfigResult, NodestatError, NodestatResult, ParseError, ParseResult,
    SessionError, SessionResult, TransferError, TransferResult,
};
pub use poller::{HostErrorPolicy, HostReport, PollObserver, Poller, RunSummary};
pub use presenter::{Cell, DisplayRow, Emphasis, Span, StatsPresenter};
pub use probe::{ProbeExecutor, RawProbeOutput};
pub use session::{
    CommandOutput, Connector, FileManager, FileTransfer, HostKeyPolicy, OpenSshConnector,
    RemoteShell, Session, SessionChannels, SessionState, SshTarget,
};
pub use stats::{MemoryInfo, ProcessEntry, StatsParser, StatsSnapshot};
