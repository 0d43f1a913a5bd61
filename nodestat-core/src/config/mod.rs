//! Configuration loading for `nodestat`
//!
//! Two file formats are accepted: an env-style file of `KEY=VALUE` lines
//! (the `REMOTE_*` keys below) and, for paths ending in `.toml`, a TOML
//! document with the same settings in snake case. Variables already present
//! in the process environment override values from either file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::poller::HostErrorPolicy;
use crate::probe::DEFAULT_PYTHON;
use crate::session::{DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_SSH_PORT, HostKeyPolicy, SshTarget};

/// Space-separated host list
pub const ENV_HOSTS: &str = "REMOTE_HOSTNAME_LIST";
/// Remote user name
pub const ENV_USERNAME: &str = "REMOTE_USERNAME";
/// Remote directory the probe is uploaded to
pub const ENV_REMOTE_PATH: &str = "REMOTE_PATH";
/// SSH port
pub const ENV_PORT: &str = "REMOTE_PORT";
/// Connect timeout in seconds
pub const ENV_CONNECT_TIMEOUT: &str = "REMOTE_CONNECT_TIMEOUT";
/// Remote Python interpreter
pub const ENV_PYTHON: &str = "REMOTE_PYTHON";
/// Host key policy (`accept-all`, `accept-new`, `strict`)
pub const ENV_HOST_KEY_POLICY: &str = "REMOTE_HOST_KEY_POLICY";

/// Settings for one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodestatConfig {
    /// Hosts to poll, in order
    #[serde(default)]
    pub hosts: Vec<String>,
    /// Remote user name, shared by all hosts
    #[serde(default)]
    pub username: String,
    /// Remote directory for the probe; empty means the login directory
    #[serde(default)]
    pub remote_path: String,
    /// SSH port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Transport connect timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Remote Python interpreter
    #[serde(default = "default_python")]
    pub python: String,
    /// Host key verification policy
    #[serde(default)]
    pub host_key_policy: HostKeyPolicy,
    /// What to do when a host fails for a reason other than authentication
    #[serde(default)]
    pub host_error_policy: HostErrorPolicy,
}

const fn default_port() -> u16 {
    DEFAULT_SSH_PORT
}

const fn default_connect_timeout_secs() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

fn default_python() -> String {
    DEFAULT_PYTHON.to_string()
}

impl Default for NodestatConfig {
    fn default() -> Self {
        Self {
            hosts: Vec::new(),
            username: String::new(),
            remote_path: String::new(),
            port: default_port(),
            connect_timeout_secs: default_connect_timeout_secs(),
            python: default_python(),
            host_key_policy: HostKeyPolicy::default(),
            host_error_policy: HostErrorPolicy::default(),
        }
    }
}

/// Default config file location: `<config dir>/nodestat/config.toml`
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("nodestat").join("config.toml"))
}

/// Expands a leading `~` in a user-supplied path
#[must_use]
pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}

/// Parses env-style `KEY=VALUE` content.
///
/// Blank lines and `#` comments are skipped, a leading `export` is allowed,
/// and values may be wrapped in single or double quotes, with anything after
/// the closing quote ignored. Unquoted values end at ` #`.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] for a line without `=` or with an empty key.
pub fn parse_env_file(contents: &str) -> ConfigResult<HashMap<String, String>> {
    let mut vars = HashMap::new();

    for (idx, raw) in contents.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);

        let Some((key, value)) = line.split_once('=') else {
            return Err(ConfigError::Parse(format!(
                "line {}: expected KEY=VALUE",
                idx + 1
            )));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(ConfigError::Parse(format!("line {}: empty key", idx + 1)));
        }

        vars.insert(key.to_string(), unquote(value.trim()).to_string());
    }

    Ok(vars)
}

/// Strips surrounding quotes, or an inline ` #` comment from an unquoted value.
/// Anything after the closing quote is ignored.
fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(rest) = value.strip_prefix(quote)
            && let Some(end) = rest.find(quote)
        {
            return &rest[..end];
        }
    }
    value
        .find(" #")
        .map_or(value, |pos| value[..pos].trim_end())
}

impl NodestatConfig {
    /// Loads the file at `path` and applies environment overrides.
    ///
    /// The result is not validated, so callers can still replace the host
    /// list before calling [`NodestatConfig::validate`].
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    /// Like [`NodestatConfig::load`], reading overrides through `lookup`
    ///
    /// # Errors
    ///
    /// See [`NodestatConfig::load`].
    pub fn load_with_env<F>(path: &Path, lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

        let mut config = if is_toml {
            Self::from_toml(&contents)?
        } else {
            Self::from_env_vars(&parse_env_file(&contents)?)?
        };

        config.apply_env(lookup)?;

        tracing::debug!(
            path = %path.display(),
            hosts = config.hosts.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Parses a TOML document
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the document is not valid TOML or has
    /// the wrong shape.
    pub fn from_toml(contents: &str) -> ConfigResult<Self> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Builds a config from env-style variables. Unknown keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a value that does not parse.
    pub fn from_env_vars(vars: &HashMap<String, String>) -> ConfigResult<Self> {
        let mut config = Self::default();
        config.apply_env(|key| vars.get(key).cloned())?;
        Ok(config)
    }

    /// Overrides settings with every `REMOTE_*` key `lookup` returns
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a value that does not parse.
    pub fn apply_env<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(hosts) = lookup(ENV_HOSTS) {
            self.hosts = hosts.split_whitespace().map(str::to_string).collect();
        }
        if let Some(username) = lookup(ENV_USERNAME) {
            self.username = username.trim().to_string();
        }
        if let Some(remote_path) = lookup(ENV_REMOTE_PATH) {
            self.remote_path = remote_path.trim().to_string();
        }
        if let Some(port) = lookup(ENV_PORT) {
            self.port = port.trim().parse().map_err(|e| ConfigError::Invalid {
                key: ENV_PORT,
                reason: format!("`{port}`: {e}"),
            })?;
        }
        if let Some(timeout) = lookup(ENV_CONNECT_TIMEOUT) {
            self.connect_timeout_secs =
                timeout.trim().parse().map_err(|e| ConfigError::Invalid {
                    key: ENV_CONNECT_TIMEOUT,
                    reason: format!("`{timeout}`: {e}"),
                })?;
        }
        if let Some(python) = lookup(ENV_PYTHON) {
            self.python = python.trim().to_string();
        }
        if let Some(policy) = lookup(ENV_HOST_KEY_POLICY) {
            self.host_key_policy = policy.trim().parse().map_err(|reason| ConfigError::Invalid {
                key: ENV_HOST_KEY_POLICY,
                reason,
            })?;
        }
        Ok(())
    }

    /// Replaces the host list, as `--name` does
    #[must_use]
    pub fn with_hosts(mut self, hosts: Vec<String>) -> Self {
        self.hosts = hosts;
        self
    }

    /// Checks that the settings can be used for a run
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] without hosts or username and
    /// [`ConfigError::Invalid`] for a zero port or an empty interpreter.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.hosts.iter().all(|h| h.trim().is_empty()) {
            return Err(ConfigError::Missing(ENV_HOSTS));
        }
        if self.username.trim().is_empty() {
            return Err(ConfigError::Missing(ENV_USERNAME));
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid {
                key: ENV_PORT,
                reason: "port must be between 1 and 65535".to_string(),
            });
        }
        if self.python.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: ENV_PYTHON,
                reason: "interpreter must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Connect timeout as a duration
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// One SSH target per configured host, all sharing `password`
    #[must_use]
    pub fn targets(&self, password: &SecretString) -> Vec<SshTarget> {
        self.hosts
            .iter()
            .filter(|h| !h.trim().is_empty())
            .map(|host| {
                SshTarget::new(host.trim(), self.username.as_str(), password.clone())
                    .with_port(self.port)
                    .with_connect_timeout(self.connect_timeout())
                    .with_host_key_policy(self.host_key_policy)
            })
            .collect()
    }
}
