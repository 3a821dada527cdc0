//! Process Runner
//!
//! Executes the ADB binary with a bounded lifetime and captured output.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

/// Windows `CREATE_NO_WINDOW` process creation flag
#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Captured result of a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Error stream if it has content, otherwise standard output
    pub fn failure_text(&self) -> &str {
        if self.stderr.trim().is_empty() {
            self.stdout.trim()
        } else {
            self.stderr.trim()
        }
    }
}

/// Runner errors
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("process timed out after {0:?}")]
    TimedOut(Duration),
    #[error("failed to spawn process: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Something that can run a program and capture its output
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(
        &self,
        program: &Path,
        args: &[String],
        timeout: Duration,
    ) -> Result<CommandOutput, RunError>;
}

/// Runs real child processes on the tokio runtime
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    fn command(program: &Path, args: &[String]) -> Command {
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(windows)]
        command.creation_flags(CREATE_NO_WINDOW);

        command
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(
        &self,
        program: &Path,
        args: &[String],
        timeout: Duration,
    ) -> Result<CommandOutput, RunError> {
        debug!(program = %program.display(), ?args, ?timeout, "Spawning process");

        let child = Self::command(program, args).spawn()?;

        // Dropping the future on timeout kills the child (kill_on_drop)
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => return Err(RunError::TimedOut(timeout)),
        };

        let output = CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        debug!(exit_code = ?output.exit_code, "Process finished");
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_text_prefers_stderr() {
        let output = CommandOutput {
            exit_code: Some(1),
            stdout: "Performing Streamed Install\n".into(),
            stderr: "adb: failed to install app.apk\n".into(),
        };
        assert_eq!(output.failure_text(), "adb: failed to install app.apk");

        let output = CommandOutput {
            exit_code: Some(0),
            stdout: "Failure [INSTALL_FAILED_VERSION_DOWNGRADE]\r\n".into(),
            stderr: "  \n".into(),
        };
        assert_eq!(output.failure_text(), "Failure [INSTALL_FAILED_VERSION_DOWNGRADE]");
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let result = SystemRunner
            .run(Path::new("/definitely/not/a/real/adb"), &[], Duration::from_secs(1))
            .await;
        assert!(matches!(result, Err(RunError::Spawn(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_captures_output_and_exit_code() {
        let args = vec!["-c".to_string(), "echo out; echo err >&2; exit 3".to_string()];
        let output = SystemRunner
            .run(Path::new("/bin/sh"), &args, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
        assert!(!output.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_is_distinct() {
        let args = vec!["-c".to_string(), "sleep 5".to_string()];
        let result = SystemRunner
            .run(Path::new("/bin/sh"), &args, Duration::from_millis(100))
            .await;
        assert!(matches!(result, Err(RunError::TimedOut(_))));
    }
}
