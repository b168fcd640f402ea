// src/exec/command.rs

//! Shell command work.

use std::process::Stdio;

use anyhow::{anyhow, bail, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::errors::TaskError;
use crate::task::{TaskContext, Work};

/// Runs `cmd` through the platform shell and finishes the task when the
/// process exits. A non-zero exit status is recorded as an execution error.
/// Cancelling the task while the process runs kills it.
#[derive(Debug, Clone)]
pub struct CommandWork {
    name: String,
    cmd: String,
}

impl CommandWork {
    pub fn new(name: impl Into<String>, cmd: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cmd: cmd.into(),
        }
    }

    pub fn cmd(&self) -> &str {
        &self.cmd
    }
}

impl Work for CommandWork {
    fn execute(self: Box<Self>, ctx: TaskContext) {
        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(err) => {
                let error = TaskError::execution(anyhow!("no tokio runtime for '{}': {err}", self.name));
                if let Err(err) = ctx.finish_with_error(error) {
                    debug!(task = %self.name, error = %err, "task already finishing");
                }
                return;
            }
        };

        handle.spawn(async move {
            let errors = match run_command(&self.name, &self.cmd, &ctx).await {
                Ok(Exit::Completed) => Vec::new(),
                Ok(Exit::Killed) => vec![TaskError::Cancelled(format!(
                    "command `{}` was killed",
                    self.cmd
                ))],
                Err(err) => {
                    warn!(task = %self.name, error = %err, "command failed");
                    vec![TaskError::execution(err)]
                }
            };
            if let Err(err) = ctx.finish_with_errors(errors) {
                debug!(task = %self.name, error = %err, "task already finishing");
            }
        });
    }
}

enum Exit {
    Completed,
    Killed,
}

async fn run_command(name: &str, cmd_line: &str, ctx: &TaskContext) -> Result<Exit> {
    info!(task = %name, cmd = %cmd_line, "starting task process");

    // Build a shell command appropriate for the platform.
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd_line);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd_line);
        c
    };

    cmd.stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning process for task '{name}'"))?;

    if let Some(stdout) = child.stdout.take() {
        let task_name = name.to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                info!(task = %task_name, "stdout: {}", line);
            }
        });
    }

    // Always consume stderr so buffers don't fill.
    if let Some(stderr) = child.stderr.take() {
        let task_name = name.to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(task = %task_name, "stderr: {}", line);
            }
        });
    }

    tokio::select! {
        status = child.wait() => {
            let status = status
                .with_context(|| format!("waiting for process of task '{name}'"))?;
            let code = status.code().unwrap_or(-1);

            info!(
                task = %name,
                exit_code = code,
                success = status.success(),
                "task process exited"
            );

            if !status.success() {
                bail!("command `{cmd_line}` exited with status {code}");
            }
            Ok(Exit::Completed)
        }

        _ = ctx.cancelled() => {
            info!(task = %name, "task cancelled; killing process");
            if let Err(err) = child.kill().await {
                warn!(task = %name, error = %err, "failed to kill child process on cancellation");
            }
            Ok(Exit::Killed)
        }
    }
}
