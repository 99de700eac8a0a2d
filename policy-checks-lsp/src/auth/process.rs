//! `credential_process` support.
//!
//! The configured command line runs through the platform shell, like the AWS
//! CLI does, and must print a `{"Version": 1, "AccessKeyId": ..}` document.

use std::time::Duration;

use tokio::process::Command;

use super::credentials::{AwsCredentials, CredentialsDocument, CredentialsError};

const PROCESS_TIMEOUT: Duration = Duration::from_secs(60);

fn shell_command(command_line: &str) -> Command {
    if cfg!(windows) {
        let mut command = Command::new("cmd.exe");
        command.args(["/C", command_line]);
        command
    } else {
        let mut command = Command::new("sh");
        command.args(["-c", command_line]);
        command
    }
}

/// Run `command_line` and parse the credentials it prints
pub async fn run_credential_process(command_line: &str) -> Result<AwsCredentials, CredentialsError> {
    let failed = |message: String| CredentialsError::Process {
        command: command_line.to_string(),
        message,
    };

    let output = tokio::time::timeout(
        PROCESS_TIMEOUT,
        shell_command(command_line)
            .stdin(std::process::Stdio::null())
            .kill_on_drop(true)
            .output(),
    )
    .await
    .map_err(|_| failed(format!("timed out after {}s", PROCESS_TIMEOUT.as_secs())))?
    .map_err(|e| failed(e.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let code = output
            .status
            .code()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());
        return Err(failed(format!("exit status {}: {}", code, stderr.trim())));
    }

    let document: CredentialsDocument = serde_json::from_slice(&output.stdout)
        .map_err(|e| failed(format!("invalid output: {}", e)))?;
    document
        .into_credentials()
        .ok_or_else(|| failed("output has empty keys".to_string()))
}
