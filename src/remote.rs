use std::borrow::Cow;
use std::fmt;

use serde::Serialize;

use crate::error::{DeployError, DeployResult};
use crate::text::Substitution;

/// A command to run on the remote host, kept as an argument list
/// so host, user, and path values never pass through string
/// interpolation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCommand {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<String>,
    /// Set for commands that only inspect the host. They are not
    /// counted as changes when a step fails midway.
    pub read_only: bool,
}

impl RemoteCommand {
    #[must_use]
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            cwd: None,
            read_only: false,
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: &str) -> Self {
        self.args.push(arg.to_string());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_string()));
        self
    }

    #[must_use]
    pub fn current_dir(mut self, dir: &str) -> Self {
        self.cwd = Some(dir.to_string());
        self
    }

    #[must_use]
    pub const fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// The argument vector, program first.
    #[must_use]
    pub fn argv(&self) -> Vec<&str> {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect()
    }

    /// Render as a single POSIX shell command line, every word
    /// quoted as needed. `prefix` words (e.g. `sudo -n --`) are
    /// placed after the `cd` but before the program.
    #[must_use]
    pub fn to_shell(&self, prefix: &[&str]) -> String {
        let mut words: Vec<Cow<'_, str>> = prefix.iter().map(|w| quote(w)).collect();
        words.extend(self.argv().into_iter().map(quote));
        let line = words.join(" ");
        match &self.cwd {
            Some(dir) => format!("cd {} && {line}", quote(dir)),
            None => line,
        }
    }
}

impl fmt::Display for RemoteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_shell(&[]))
    }
}

/// Quote a word for a POSIX shell. Words made only of safe
/// characters are returned unchanged.
#[must_use]
pub fn quote(word: &str) -> Cow<'_, str> {
    let safe = !word.is_empty()
        && word.bytes().all(|b| {
            b.is_ascii_alphanumeric()
                || matches!(b, b'-' | b'_' | b'.' | b'/' | b'=' | b':' | b',' | b'+' | b'@' | b'%')
        });
    if safe {
        Cow::Borrowed(word)
    } else {
        Cow::Owned(format!("'{}'", word.replace('\'', r"'\''")))
    }
}

/// Result of a finished remote command. Non-zero exits are data,
/// not errors; use [`CommandOutput::require`] to turn them into
/// [`DeployError::CommandFailed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandOutput {
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    pub code: Option<i32>,
}

impl CommandOutput {
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.code, Some(0))
    }

    pub fn require(self) -> DeployResult<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(DeployError::CommandFailed {
                command: self.command,
                code: self.code,
                stderr: if self.stderr.is_empty() {
                    self.stdout
                } else {
                    self.stderr
                },
            })
        }
    }
}

/// Everything the deployment steps need from the target host.
///
/// Errors are reserved for transport problems (unreachable host,
/// authentication); a command exiting non-zero is reported through
/// [`CommandOutput::code`].
pub trait Remote {
    /// Run a command as the deploying user.
    fn run(&self, command: &RemoteCommand) -> DeployResult<CommandOutput>;

    /// Run a command with elevated privilege.
    fn sudo(&self, command: &RemoteCommand) -> DeployResult<CommandOutput>;

    /// Whether a file or directory exists.
    fn exists(&self, path: &str) -> DeployResult<bool>;

    /// Edit a file in place. Returns whether the file changed.
    fn substitute(&self, path: &str, edit: &Substitution, privileged: bool)
    -> DeployResult<bool>;

    /// Append a line unless already present, creating the file if
    /// needed. Returns whether the file changed.
    fn append_line(&self, path: &str, line: &str) -> DeployResult<bool>;
}
