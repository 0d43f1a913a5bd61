//! CLI error types and exit codes.

use nodestat_core::{ConfigError, NodestatError, SessionError};

/// Exit codes for CLI operations
pub mod exit_codes {
    /// General error - configuration, transfer, parse or other non-connection errors
    pub const GENERAL_ERROR: i32 = 1;
    /// Connection failure - a host could not be reached or a remote command
    /// could not be run
    pub const CONNECTION_FAILURE: i32 = 2;
    /// Authentication failure - a host rejected the username/password pair
    pub const AUTHENTICATION_FAILURE: i32 = 3;
}

/// CLI error type
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Authentication was rejected
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Connection or remote command error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Probe upload, removal or download error
    #[error("Transfer error: {0}")]
    Transfer(String),

    /// Malformed remote output
    #[error("Parse error: {0}")]
    Parse(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<NodestatError> for CliError {
    fn from(err: NodestatError) -> Self {
        match err {
            NodestatError::Session(
                e @ (SessionError::AuthenticationFailed { .. } | SessionError::Terminated(_)),
            ) => Self::Authentication(e.to_string()),
            NodestatError::Session(e) => Self::Connection(e.to_string()),
            NodestatError::Transfer(e) => Self::Transfer(e.to_string()),
            NodestatError::Parse(e) => Self::Parse(e.to_string()),
            NodestatError::Config(e) => Self::Config(e.to_string()),
        }
    }
}

impl CliError {
    /// Returns the appropriate exit code for this error type.
    ///
    /// Exit codes:
    /// - 0: Success (not an error)
    /// - 1: General error (configuration, transfer, parse, IO)
    /// - 2: Connection failure
    /// - 3: Authentication failure
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Authentication(_) => exit_codes::AUTHENTICATION_FAILURE,
            Self::Connection(_) => exit_codes::CONNECTION_FAILURE,
            Self::Config(_) | Self::Transfer(_) | Self::Parse(_) | Self::Io(_) => {
                exit_codes::GENERAL_ERROR
            }
        }
    }
}
