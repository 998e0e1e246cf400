use std::io::Write;
use std::process::{Command, Output, Stdio};

use crate::error::{DeployError, DeployResult};
use crate::remote::CommandOutput;

/// Run a local command and capture its output. Fails if the
/// command returns a non-zero exit code.
pub fn run(program: &str, args: &[&str]) -> DeployResult<String> {
    let output = capture(program, args)?;
    Ok(output.require()?.stdout.trim().to_string())
}

/// Run a local command and capture its output without judging
/// the exit code. Stdout is kept verbatim.
pub fn capture(program: &str, args: &[&str]) -> DeployResult<CommandOutput> {
    let output = spawn(program, args)?;
    Ok(to_command_output(program, args, &output))
}

/// Like [`capture`], but fails with [`DeployError::NotUtf8`] rather
/// than replacing invalid bytes in stdout.
pub fn capture_text(program: &str, args: &[&str]) -> DeployResult<CommandOutput> {
    let output = spawn(program, args)?;
    if std::str::from_utf8(&output.stdout).is_err() {
        return Err(DeployError::NotUtf8(format_command(program, args)));
    }
    Ok(to_command_output(program, args, &output))
}

/// Run a local command that pipes its stdin from a byte slice.
pub fn capture_with_stdin(
    program: &str,
    args: &[&str],
    stdin_data: &[u8],
) -> DeployResult<CommandOutput> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| not_found_or_io(program, e))?;

    if let Some(stdin) = &mut child.stdin {
        stdin.write_all(stdin_data)?;
    }
    drop(child.stdin.take());

    let output = child.wait_with_output()?;
    Ok(to_command_output(program, args, &output))
}

/// Commit hash of the local checkout's HEAD, used as the default
/// revision to deploy.
pub fn local_head_revision() -> DeployResult<String> {
    let rev = run("git", &["log", "-n", "1", "--format=%H"])?;
    if rev.is_empty() {
        return Err(DeployError::InvalidInput(
            "local checkout has no commits".into(),
        ));
    }
    Ok(rev)
}

fn spawn(program: &str, args: &[&str]) -> DeployResult<Output> {
    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| not_found_or_io(program, e))
}

fn not_found_or_io(program: &str, e: std::io::Error) -> DeployError {
    if e.kind() == std::io::ErrorKind::NotFound {
        DeployError::CommandNotFound(program.to_string())
    } else {
        DeployError::Io(e)
    }
}

fn to_command_output(program: &str, args: &[&str], output: &Output) -> CommandOutput {
    CommandOutput {
        command: format_command(program, args),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        code: output.status.code(),
    }
}

fn format_command(program: &str, args: &[&str]) -> String {
    let mut parts = vec![program.to_string()];
    parts.extend(args.iter().map(|a| (*a).to_string()));
    parts.join(" ")
}
