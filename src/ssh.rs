use tracing::debug;

use crate::cmd;
use crate::error::{DeployError, DeployResult};
use crate::remote::{CommandOutput, Remote, RemoteCommand};
use crate::text::{self, Substitution};

/// Exit status `ssh` itself uses for connection and
/// authentication errors.
const SSH_TRANSPORT_FAILURE: i32 = 255;

const SUDO: &[&str] = &["sudo", "-n", "--"];

/// How a command's stdout is collected. File contents are read as
/// `Text` so invalid UTF-8 is an error, not a silent replacement
/// written back on the next edit.
enum Capture<'a> {
    Lossy,
    Text,
    Stdin(&'a [u8]),
}

/// SSH session wrapper implementing [`Remote`] with the system
/// `ssh` client.
pub struct SshSession {
    host: String,
    user: String,
    key: Option<String>,
}

impl SshSession {
    #[must_use]
    pub fn new(host: &str, user: &str) -> Self {
        Self {
            host: host.to_string(),
            user: user.to_string(),
            key: None,
        }
    }

    #[must_use]
    pub fn with_key(mut self, key_path: &str) -> Self {
        self.key = Some(key_path.to_string());
        self
    }

    fn exec(&self, command: &RemoteCommand, prefix: &[&str]) -> DeployResult<CommandOutput> {
        self.exec_as(command, prefix, Capture::Lossy)
    }

    fn exec_as(
        &self,
        command: &RemoteCommand,
        prefix: &[&str],
        capture: Capture<'_>,
    ) -> DeployResult<CommandOutput> {
        let line = command.to_shell(prefix);
        debug!(host = %self.host, command = %line, "remote exec");

        let args = self.build_ssh_args(&line);
        let refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let mut output = match capture {
            Capture::Lossy => cmd::capture("ssh", &refs)?,
            Capture::Text => cmd::capture_text("ssh", &refs).map_err(|e| match e {
                DeployError::NotUtf8(_) => DeployError::NotUtf8(format!("{}: {line}", self.host)),
                other => other,
            })?,
            Capture::Stdin(data) => cmd::capture_with_stdin("ssh", &refs, data)?,
        };

        if output.code == Some(SSH_TRANSPORT_FAILURE) {
            return Err(DeployError::SshFailed(format!(
                "{}: {}",
                self.destination(),
                output.stderr
            )));
        }
        output.command = line;
        Ok(output)
    }

    fn read_file(&self, path: &str, privileged: bool) -> DeployResult<Option<String>> {
        let prefix: &[&str] = if privileged { SUDO } else { &[] };
        if !self.exists(path)? {
            return Ok(None);
        }
        let cat = RemoteCommand::new("cat").arg("--").arg(path);
        let output = self.exec_as(&cat, prefix, Capture::Text)?.require()?;
        Ok(Some(output.stdout))
    }

    fn write_file(&self, path: &str, content: &str, privileged: bool) -> DeployResult<()> {
        let prefix: &[&str] = if privileged { SUDO } else { &[] };
        let tee = RemoteCommand::new("tee").arg("--").arg(path);
        self.exec_as(&tee, prefix, Capture::Stdin(content.as_bytes()))?
            .require()?;
        Ok(())
    }

    fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    fn build_ssh_args(&self, command: &str) -> Vec<String> {
        let mut args = self.ssh_base_args();
        args.push(self.destination());
        args.push(command.to_string());
        args
    }

    fn ssh_base_args(&self) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
            "-o".to_string(),
            "ConnectTimeout=10".to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
        ];
        if let Some(key) = &self.key {
            args.push("-i".to_string());
            args.push(key.clone());
        }
        args
    }
}

impl Remote for SshSession {
    fn run(&self, command: &RemoteCommand) -> DeployResult<CommandOutput> {
        self.exec(command, &[])
    }

    fn sudo(&self, command: &RemoteCommand) -> DeployResult<CommandOutput> {
        self.exec(command, SUDO)
    }

    fn exists(&self, path: &str) -> DeployResult<bool> {
        let output = self.exec(&RemoteCommand::new("test").arg("-e").arg(path), &[])?;
        match output.code {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(output.require().err().unwrap_or_else(|| {
                DeployError::Other(format!("test -e {path}: unexpected status"))
            })),
        }
    }

    fn substitute(
        &self,
        path: &str,
        edit: &Substitution,
        privileged: bool,
    ) -> DeployResult<bool> {
        let content = self
            .read_file(path, privileged)?
            .ok_or_else(|| DeployError::FileNotFound(format!("{}:{path}", self.host)))?;
        match text::substitute(&content, edit) {
            Some(updated) => {
                self.write_file(path, &updated, privileged)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn append_line(&self, path: &str, line: &str) -> DeployResult<bool> {
        let content = self.read_file(path, false)?.unwrap_or_default();
        match text::append_line(&content, line) {
            Some(updated) => {
                self.write_file(path, &updated, false)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
