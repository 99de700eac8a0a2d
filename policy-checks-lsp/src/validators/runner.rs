//! Process execution for the CLI validators.
//!
//! Commands are spawned directly (program + argument vector, no shell) and
//! awaited to completion. There is no timeout: a validator that hangs keeps
//! its validation pending until it exits.

use async_trait::async_trait;
use tokio::process::Command;

use super::ValidatorCommand;

/// Captured output of a successful run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Command failed: {command}\n{stderr}")]
    Failed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
}

/// Runs a validator command and captures its output
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &ValidatorCommand) -> Result<ProcessOutput, ProcessError>;
}

/// [`CommandRunner`] backed by `tokio::process`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioCommandRunner;

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, command: &ValidatorCommand) -> Result<ProcessOutput, ProcessError> {
        tracing::debug!("Running {}", command.display());

        let output = Command::new(&command.program)
            .args(&command.args)
            .stdin(std::process::Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ProcessError::Spawn {
                program: command.program.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(ProcessError::Failed {
                command: command.display(),
                code: output.status.code(),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(ProcessOutput { stdout, stderr })
    }
}
