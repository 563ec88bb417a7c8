pub mod ctl;

use std::{process::Stdio, time::Duration};

use futures::future::BoxFuture;
use thiserror::Error;
use tokio::process::Command;

pub use ctl::{ClusterCtl, shell_quote};

/// Exit status reserved for "the command ran out of time", same as `timeout(1)`.
pub const TIMEOUT_STATUS: i32 = 124;

/// Exit status and combined stdout/stderr of one finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmdResult {
    pub status: i32,
    pub output: String,
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to run `{command}`: {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("command timed out")]
    TimedOut,
    #[error("command exited with status {status}")]
    Failed { status: i32, output: String },
}

impl CmdResult {
    pub fn new(status: i32, output: impl Into<String>) -> Self {
        Self {
            status,
            output: output.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.status == 0
    }

    pub fn timed_out(&self) -> bool {
        self.status == TIMEOUT_STATUS
    }

    /// Turns a nonzero status into the matching [`CommandError`].
    pub fn into_output(self) -> Result<String, CommandError> {
        match self.status {
            0 => Ok(self.output),
            TIMEOUT_STATUS => Err(CommandError::TimedOut),
            status => Err(CommandError::Failed {
                status,
                output: self.output,
            }),
        }
    }
}

/// Seam between the agent and the external executables.
///
/// `run` only fails when the command could not be started or waited on; a
/// process that ran to completion always yields a [`CmdResult`].
pub trait CommandRunner: Send + Sync {
    fn run<'a>(&'a self, command: &'a str) -> BoxFuture<'a, Result<CmdResult, CommandError>>;
}

/// Runs commands through `/bin/sh -c` with a wall-clock limit.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    timeout: Duration,
}

impl ShellRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn exec(&self, command: &str) -> Result<CmdResult, CommandError> {
        log::debug!("Executing command: {}", command);
        let launch_err = |source| CommandError::Launch {
            command: command.to_string(),
            source,
        };

        let mut cmd = Command::new("/bin/sh");
        cmd.arg("-c")
            .arg(format!("{{ {command}\n}} 2>&1"))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        // The tools run as grandchildren of the shell; a group of their own
        // lets the whole tree be killed on expiry.
        #[cfg(unix)]
        cmd.process_group(0);
        let child = cmd.spawn().map_err(launch_err)?;
        let pgid = child.id();

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(res) => res.map_err(launch_err)?,
            Err(_) => {
                log::warn!("Command timed out after {:?}: {}", self.timeout, command);
                if let Some(pgid) = pgid {
                    kill_group(pgid).await;
                }
                return Ok(CmdResult::new(TIMEOUT_STATUS, ""));
            }
        };

        let result = CmdResult::new(
            exit_code(&output.status),
            String::from_utf8_lossy(&output.stdout).into_owned(),
        );
        log::trace!(
            "Result of `{}`: status={} output={}",
            command,
            result.status,
            result.output
        );
        Ok(result)
    }
}

impl CommandRunner for ShellRunner {
    fn run<'a>(&'a self, command: &'a str) -> BoxFuture<'a, Result<CmdResult, CommandError>> {
        Box::pin(self.exec(command))
    }
}

/// SIGKILLs every process left in the group led by the timed-out shell.
#[cfg(unix)]
async fn kill_group(pgid: u32) {
    let status = Command::new("/bin/sh")
        .arg("-c")
        .arg(format!("kill -s KILL -- -{pgid}"))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
    match status {
        Ok(status) if status.success() => {}
        Ok(status) => log::debug!("kill of process group {} exited with {}", pgid, status),
        Err(e) => log::error!("Failed to kill process group {}: {}", pgid, e),
    }
}

#[cfg(not(unix))]
async fn kill_group(_pgid: u32) {}

#[cfg(unix)]
fn exit_code(status: &std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_code(status: &std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}
