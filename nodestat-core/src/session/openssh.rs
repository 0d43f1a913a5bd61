//! Session channels backed by the OpenSSH client programs
//!
//! Every channel operation spawns `ssh`, `scp` or `sftp` (wrapped in
//! `sshpass -e` when a password is set and `sshpass` is installed). The
//! password travels in the `SSHPASS` environment variable, never on the
//! command line.

use std::process::Stdio;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use secrecy::ExposeSecret;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{
    CommandOutput, Connector, FileManager, FileTransfer, RemoteShell, SessionChannels, SshTarget,
};
use crate::error::{SessionError, SessionResult, TransferError, TransferResult};

/// Exit status `sshpass` uses for a rejected password
pub const SSHPASS_WRONG_PASSWORD: i32 = 5;

/// Client messages that mean the credentials were rejected
static AUTH_FAILURE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)permission denied|authentication failed|too many authentication failures")
        .expect("AUTH_FAILURE_REGEX is a valid regex pattern")
});

/// Which client program a command line is built for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Client {
    Ssh,
    Scp,
    Sftp,
}

impl Client {
    const fn program(self) -> &'static str {
        match self {
            Self::Ssh => "ssh",
            Self::Scp => "scp",
            Self::Sftp => "sftp",
        }
    }

    /// `ssh` takes `-p`, `scp` and `sftp` take `-P`
    const fn port_flag(self) -> &'static str {
        match self {
            Self::Ssh => "-p",
            Self::Scp | Self::Sftp => "-P",
        }
    }
}

/// Classifies a failed client invocation.
///
/// A rejected password is reported by `sshpass` with exit status 5 and by a
/// bare `ssh` with a `Permission denied` or similar message.
#[must_use]
pub fn classify_failure(host: &str, status: Option<i32>, stderr: &str) -> SessionError {
    let reason = stderr.trim().to_string();
    if status == Some(SSHPASS_WRONG_PASSWORD) || AUTH_FAILURE_REGEX.is_match(stderr) {
        SessionError::AuthenticationFailed {
            host: host.to_string(),
            reason: if reason.is_empty() {
                "password rejected".to_string()
            } else {
                reason
            },
        }
    } else {
        SessionError::ConnectionFailed {
            host: host.to_string(),
            reason: if reason.is_empty() {
                format!("ssh exited with status {}", status.unwrap_or(-1))
            } else {
                reason
            },
        }
    }
}

/// Builds client command lines for one target
#[derive(Debug)]
struct CommandBuilder {
    target: SshTarget,
    use_sshpass: bool,
}

impl CommandBuilder {
    fn new(target: SshTarget, sshpass_available: bool) -> Self {
        let use_sshpass = sshpass_available && !target.password.expose_secret().is_empty();
        Self {
            target,
            use_sshpass,
        }
    }

    fn command(&self, client: Client) -> Command {
        let mut cmd;

        if self.use_sshpass {
            cmd = Command::new("sshpass");
            cmd.arg("-e").arg(client.program());
            // sshpass reads the password from SSHPASS with -e
            cmd.env("SSHPASS", self.target.password.expose_secret());
        } else {
            cmd = Command::new(client.program());
            // No prompt to answer without sshpass
            cmd.arg("-o").arg("BatchMode=yes");
        }

        cmd.arg("-o").arg(format!(
            "StrictHostKeyChecking={}",
            self.target.host_key_policy.ssh_option_value()
        ));
        cmd.arg("-o").arg(format!(
            "ConnectTimeout={}",
            self.target.connect_timeout.as_secs().max(1)
        ));

        if self.target.port != super::DEFAULT_SSH_PORT {
            cmd.arg(client.port_flag()).arg(self.target.port.to_string());
        }

        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);
        cmd
    }

    fn program_name(&self, client: Client) -> &'static str {
        if self.use_sshpass {
            "sshpass"
        } else {
            client.program()
        }
    }

    /// `scp` destination for a remote path
    fn remote_spec(&self, remote_path: &str) -> String {
        format!("{}:{remote_path}", self.target.destination())
    }

    async fn run(&self, mut cmd: Command, client: Client) -> SessionResult<CommandOutput> {
        let output = cmd.output().await.map_err(|source| SessionError::Spawn {
            program: self.program_name(client),
            source,
        })?;

        Ok(CommandOutput {
            exit_status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Opens sessions by spawning the OpenSSH client programs
#[derive(Debug, Clone, Copy)]
pub struct OpenSshConnector {
    sshpass_available: bool,
}

impl OpenSshConnector {
    /// Creates a connector, checking once whether `sshpass` is installed
    #[must_use]
    pub fn new() -> Self {
        let sshpass_available = std::process::Command::new("sshpass")
            .arg("-V")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok();

        if !sshpass_available {
            tracing::warn!(
                "sshpass not found, password authentication is disabled \
                 and only keys or an agent will be used"
            );
        }

        Self { sshpass_available }
    }

    /// Returns whether password authentication through `sshpass` is possible
    #[must_use]
    pub const fn sshpass_available(&self) -> bool {
        self.sshpass_available
    }
}

impl Default for OpenSshConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for OpenSshConnector {
    async fn connect(&self, target: &SshTarget) -> SessionResult<SessionChannels> {
        let builder = Arc::new(CommandBuilder::new(
            target.clone(),
            self.sshpass_available,
        ));

        // Authenticate once with a no-op command before handing out channels
        let mut cmd = builder.command(Client::Ssh);
        cmd.arg(target.destination()).arg("true");
        let output = builder.run(cmd, Client::Ssh).await?;

        if !output.success() {
            return Err(classify_failure(
                &target.host,
                output.exit_status,
                &output.stderr,
            ));
        }

        tracing::debug!(
            host = %target.host,
            sshpass = builder.use_sshpass,
            "Authenticated"
        );

        Ok(SessionChannels {
            shell: Box::new(SshShell {
                builder: Some(Arc::clone(&builder)),
            }),
            transfer: Box::new(ScpTransfer {
                builder: Some(Arc::clone(&builder)),
            }),
            files: Box::new(SftpFiles {
                builder: Some(builder),
            }),
        })
    }
}

/// Remote shell over `ssh user@host <command>`
struct SshShell {
    builder: Option<Arc<CommandBuilder>>,
}

#[async_trait]
impl RemoteShell for SshShell {
    async fn exec(&mut self, command: &str) -> SessionResult<CommandOutput> {
        let builder = self.builder.as_ref().ok_or_else(|| {
            SessionError::CommandFailed {
                command: command.to_string(),
                reason: "shell channel is closed".to_string(),
            }
        })?;

        let mut cmd = builder.command(Client::Ssh);
        cmd.arg(builder.target.destination()).arg(command);

        tracing::debug!(host = %builder.target.host, command, "Executing remote command");
        let output = builder.run(cmd, Client::Ssh).await?;

        // 255 is ssh's own failure status, anything else belongs to the command
        if output.exit_status == Some(255) {
            return Err(SessionError::CommandFailed {
                command: command.to_string(),
                reason: output.stderr.trim().to_string(),
            });
        }

        Ok(output)
    }

    async fn close(&mut self) -> SessionResult<()> {
        self.builder = None;
        Ok(())
    }
}

/// File transfer over `scp`
struct ScpTransfer {
    builder: Option<Arc<CommandBuilder>>,
}

impl ScpTransfer {
    fn builder(&self) -> TransferResult<&CommandBuilder> {
        self.builder.as_deref().ok_or(TransferError::Closed)
    }
}

#[async_trait]
impl FileTransfer for ScpTransfer {
    async fn upload(&mut self, contents: &[u8], remote_path: &str) -> TransferResult<()> {
        let builder = self.builder()?;

        let mut staged = tempfile::NamedTempFile::new()?;
        std::io::Write::write_all(&mut staged, contents)?;
        std::io::Write::flush(&mut staged)?;

        let mut cmd = builder.command(Client::Scp);
        cmd.arg("-q")
            .arg(staged.path())
            .arg(builder.remote_spec(remote_path));

        let output = builder
            .run(cmd, Client::Scp)
            .await
            .map_err(|e| TransferError::Upload {
                remote_path: remote_path.to_string(),
                reason: e.to_string(),
            })?;

        if !output.success() {
            return Err(TransferError::Upload {
                remote_path: remote_path.to_string(),
                reason: output.stderr.trim().to_string(),
            });
        }

        tracing::debug!(
            host = %builder.target.host,
            remote_path,
            bytes = contents.len(),
            "Uploaded file"
        );
        Ok(())
    }

    async fn download(&mut self, remote_path: &str) -> TransferResult<Vec<u8>> {
        let builder = self.builder()?;

        let staged = tempfile::NamedTempFile::new()?;
        let mut cmd = builder.command(Client::Scp);
        cmd.arg("-q")
            .arg(builder.remote_spec(remote_path))
            .arg(staged.path());

        let output = builder
            .run(cmd, Client::Scp)
            .await
            .map_err(|e| TransferError::Download {
                remote_path: remote_path.to_string(),
                reason: e.to_string(),
            })?;

        if !output.success() {
            return Err(TransferError::Download {
                remote_path: remote_path.to_string(),
                reason: output.stderr.trim().to_string(),
            });
        }

        Ok(tokio::fs::read(staged.path()).await?)
    }

    async fn close(&mut self) -> TransferResult<()> {
        self.builder = None;
        Ok(())
    }
}

/// File management over an `sftp` command script fed on stdin
struct SftpFiles {
    builder: Option<Arc<CommandBuilder>>,
}

#[async_trait]
impl FileManager for SftpFiles {
    async fn remove(&mut self, remote_path: &str) -> TransferResult<()> {
        let builder = self.builder.as_deref().ok_or(TransferError::Closed)?;
        let remove_err = |reason: String| TransferError::Remove {
            remote_path: remote_path.to_string(),
            reason,
        };

        let mut cmd = builder.command(Client::Sftp);
        cmd.arg(builder.target.destination());
        cmd.stdin(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            remove_err(format!(
                "failed to spawn {}: {e}",
                builder.program_name(Client::Sftp)
            ))
        })?;

        if let Some(mut stdin) = child.stdin.take() {
            let script = format!("rm \"{}\"\nbye\n", remote_path.replace('"', "\\\""));
            stdin
                .write_all(script.as_bytes())
                .await
                .map_err(|e| remove_err(e.to_string()))?;
            // Dropping stdin sends EOF so sftp exits after the script
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| remove_err(e.to_string()))?;
        let stderr = String::from_utf8_lossy(&output.stderr);

        // sftp keeps going after a failed command in interactive mode
        if !output.status.success() || stderr.contains("Couldn't") {
            return Err(remove_err(stderr.trim().to_string()));
        }

        tracing::debug!(host = %builder.target.host, remote_path, "Removed file");
        Ok(())
    }

    async fn close(&mut self) -> TransferResult<()> {
        self.builder = None;
        Ok(())
    }
}
