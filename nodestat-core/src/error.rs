//! Error types for `nodestat`
//!
//! Each stage of the polling pipeline has its own error enum. They are
//! combined into [`NodestatError`] at the pipeline boundary.

use thiserror::Error;

/// Errors from session establishment and remote command execution
#[derive(Debug, Error)]
pub enum SessionError {
    /// The remote host rejected the username/password pair
    #[error("Authentication failed for {host}: {reason}")]
    AuthenticationFailed {
        /// Host that rejected the credentials
        host: String,
        /// Message reported by the SSH client
        reason: String,
    },

    /// The connection could not be established for a reason other than auth
    #[error("Connection to {host} failed: {reason}")]
    ConnectionFailed {
        /// Target host
        host: String,
        /// Message reported by the SSH client
        reason: String,
    },

    /// A channel was used before `open()` or after `close()`
    #[error("Session to {0} is not connected")]
    NotConnected(String),

    /// The session was terminated by an earlier authentication failure
    #[error("Session to {0} was terminated after an authentication failure")]
    Terminated(String),

    /// A remote command could not be run to completion
    #[error("Remote command `{command}` failed: {reason}")]
    CommandFailed {
        /// The command line sent to the remote shell
        command: String,
        /// Failure description
        reason: String,
    },

    /// A local client program could not be started
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        /// Program name (`ssh`, `scp`, `sftp`, `sshpass`)
        program: &'static str,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },
}

impl SessionError {
    /// Returns true for authentication failures
    #[must_use]
    pub const fn is_authentication_failure(&self) -> bool {
        matches!(self, Self::AuthenticationFailed { .. })
    }
}

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors from the file transfer and file management channels
#[derive(Debug, Error)]
pub enum TransferError {
    /// Uploading a file to the remote host failed
    #[error("Upload to {remote_path} failed: {reason}")]
    Upload {
        /// Destination on the remote host
        remote_path: String,
        /// Failure description
        reason: String,
    },

    /// Downloading a file from the remote host failed
    #[error("Download of {remote_path} failed: {reason}")]
    Download {
        /// Source on the remote host
        remote_path: String,
        /// Failure description
        reason: String,
    },

    /// Removing a remote file failed
    #[error("Removal of {remote_path} failed: {reason}")]
    Remove {
        /// Remote file that could not be removed
        remote_path: String,
        /// Failure description
        reason: String,
    },

    /// Staging the local copy of a transferred file failed
    #[error("Local staging file error: {0}")]
    LocalFile(#[from] std::io::Error),

    /// The channel was already closed
    #[error("Transfer channel is closed")]
    Closed,
}

/// Result type for transfer operations
pub type TransferResult<T> = Result<T, TransferError>;

/// Errors raised while decoding probe or process-listing output
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The probe did not print the expected number of lines
    #[error("Probe printed {actual} lines, expected {expected}")]
    LineCount {
        /// Number of lines the schema requires
        expected: usize,
        /// Number of lines received
        actual: usize,
    },

    /// A probe line is not a well-formed literal
    #[error("Line {line} ({field}) is not a valid literal: {reason}")]
    Literal {
        /// 1-based line number
        line: usize,
        /// Schema field name
        field: &'static str,
        /// Decoder message
        reason: String,
    },

    /// A probe line decoded to the wrong shape for its field
    #[error("Line {line} ({field}) has the wrong shape: {reason}")]
    Field {
        /// 1-based line number
        line: usize,
        /// Schema field name
        field: &'static str,
        /// Schema mismatch description
        reason: String,
    },

    /// A process listing line is malformed
    #[error("Malformed process line `{line}`: {reason}")]
    ProcessLine {
        /// The offending line
        line: String,
        /// Failure description
        reason: String,
    },

    /// The per-core list length disagrees with the logical CPU count
    #[error("Per-core list has {per_core} entries but the host reports {logical} logical CPUs")]
    CoreCount {
        /// Reported logical CPU count
        logical: u32,
        /// Length of the per-core list
        per_core: usize,
    },
}

/// Result type for parsing operations
pub type ParseResult<T> = Result<T, ParseError>;

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("Failed to read {path}: {source}")]
    Read {
        /// Path of the file
        path: String,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// The configuration file could not be parsed
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// A required setting is missing
    #[error("Missing required setting {0}")]
    Missing(&'static str),

    /// A setting has an invalid value
    #[error("Invalid value for {key}: {reason}")]
    Invalid {
        /// Setting name
        key: &'static str,
        /// Why the value was rejected
        reason: String,
    },
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Top-level error for a host poll or a whole run
#[derive(Debug, Error)]
pub enum NodestatError {
    /// Session error
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Transfer error
    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// Parse error
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl NodestatError {
    /// Returns true if this error must abort the whole run
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Session(e) if e.is_authentication_failure())
    }
}

/// Result type for pipeline operations
pub type NodestatResult<T> = Result<T, NodestatError>;
