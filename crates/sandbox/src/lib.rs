//! Sandboxed Executor: runs untrusted snippets in an isolated child process
//! with a hard wall-clock timeout.
//!
//! The boundary is fail closed, report don't throw: spawn failures, timeouts,
//! and nonzero exits are all encoded in the returned [`ExecutionResult`],
//! never surfaced as errors. The snippet's temporary file is removed on every
//! exit path.

use std::io::Write;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tempfile::{Builder, NamedTempFile};
use tokio::process::Command;
use tracing::debug;

use sage_core::ExecutionResult;

#[derive(Clone, Debug)]
pub struct SandboxExecutor {
    interpreter: String,
    temp_dir: Option<PathBuf>,
}

impl SandboxExecutor {
    pub fn new(interpreter: impl Into<String>) -> Self {
        Self { interpreter: interpreter.into(), temp_dir: None }
    }

    /// Places snippet files under `dir` instead of the system temp dir.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    /// Writes `snippet` to a uniquely named temporary file, runs it under the
    /// configured interpreter, and captures complete stdout/stderr. On
    /// timeout the child is killed and the result carries the sentinel exit
    /// code `-1`. No retries: a failed run is terminal for this invocation.
    pub async fn run(&self, snippet: &str, timeout: Duration) -> ExecutionResult {
        // Holding the NamedTempFile for the whole call guarantees removal on
        // success, timeout, and spawn failure alike.
        let script = match self.write_snippet(snippet) {
            Ok(script) => script,
            Err(error) => {
                return ExecutionResult::failure(format!("could not stage snippet: {error}"))
            }
        };

        let child = Command::new(&self.interpreter)
            .arg(script.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(error) => {
                return ExecutionResult::failure(format!(
                    "could not spawn `{}`: {error}",
                    self.interpreter
                ))
            }
        };

        // Dropping the wait future on timeout drops the child handle, and
        // kill_on_drop reaps the process.
        let waited = tokio::time::timeout(timeout, child.wait_with_output()).await;

        match waited {
            Ok(Ok(output)) => {
                let exit_code = output.status.code().unwrap_or(-1);
                debug!(
                    event_name = "sandbox.run.finished",
                    exit_code,
                    "sandboxed execution finished"
                );
                ExecutionResult {
                    succeeded: output.status.success(),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    exit_code,
                }
            }
            Ok(Err(error)) => {
                ExecutionResult::failure(format!("could not collect child output: {error}"))
            }
            Err(_) => {
                debug!(
                    event_name = "sandbox.run.timeout",
                    timeout_secs = timeout.as_secs(),
                    "sandboxed execution timed out, child killed"
                );
                ExecutionResult::failure(format!(
                    "execution timed out ({}s exceeded)",
                    timeout.as_secs()
                ))
            }
        }
    }

    fn write_snippet(&self, snippet: &str) -> std::io::Result<NamedTempFile> {
        let mut builder = Builder::new();
        builder.prefix("sage-snippet-").suffix(".py");
        let mut file = match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        file.write_all(snippet.as_bytes())?;
        file.flush()?;
        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::SandboxExecutor;

    fn python_available() -> bool {
        std::process::Command::new("python3")
            .arg("--version")
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    #[tokio::test]
    async fn successful_run_captures_stdout() {
        if !python_available() {
            return;
        }
        let executor = SandboxExecutor::new("python3");
        let result = executor.run("print(1+1)", Duration::from_secs(5)).await;

        assert!(result.succeeded);
        assert!(result.stdout.contains('2'));
        assert_eq!(result.exit_code, 0);
    }

    #[tokio::test]
    async fn nonzero_exit_is_reported_not_thrown() {
        if !python_available() {
            return;
        }
        let executor = SandboxExecutor::new("python3");
        let result = executor
            .run("import sys\nsys.stderr.write('boom')\nsys.exit(3)", Duration::from_secs(5))
            .await;

        assert!(!result.succeeded);
        assert_eq!(result.exit_code, 3);
        assert!(result.stderr.contains("boom"));
    }

    #[tokio::test]
    async fn timeout_kills_child_and_cleans_up() {
        if !python_available() {
            return;
        }
        let dir = tempfile::tempdir().expect("tempdir");
        let executor = SandboxExecutor::new("python3").with_temp_dir(dir.path());

        let started = Instant::now();
        let result = executor.run("while True: pass", Duration::from_secs(1)).await;
        let elapsed = started.elapsed();

        assert!(!result.succeeded);
        assert_eq!(result.exit_code, -1);
        assert!(result.stderr.contains("timed out"));
        assert!(elapsed < Duration::from_secs(3), "timeout must bound wall time");

        let leftovers = std::fs::read_dir(dir.path()).expect("read temp dir").count();
        assert_eq!(leftovers, 0, "snippet file must be removed after timeout");
    }

    #[tokio::test]
    async fn spawn_failure_becomes_failed_result() {
        let dir = tempfile::tempdir().expect("tempdir");
        let executor =
            SandboxExecutor::new("sage-no-such-interpreter").with_temp_dir(dir.path());
        let result = executor.run("print('hi')", Duration::from_secs(1)).await;

        assert!(!result.succeeded);
        assert_eq!(result.exit_code, -1);
        assert!(result.stderr.contains("could not spawn"));

        let leftovers = std::fs::read_dir(dir.path()).expect("read temp dir").count();
        assert_eq!(leftovers, 0, "snippet file must be removed after spawn failure");
    }
}
