//! Test execution for practice attempts
//!
//! A runner receives a candidate solution and its test file, executes the
//! tests, and reports pass/fail plus combined output.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("test command is empty")]
    EmptyCommand,

    #[error("tests timed out after {0}s")]
    Timeout(u64),
}

/// Outcome of one test run.
#[derive(Debug, Clone, PartialEq)]
pub struct TestRun {
    pub passed: bool,
    pub exit_code: Option<i32>,
    /// Combined stdout and stderr.
    pub output: String,
}

#[async_trait::async_trait]
pub trait TestRunner: Send + Sync {
    async fn run(&self, solution: &str, tests: &str) -> Result<TestRun, RunnerError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Program and arguments, run inside the scratch directory.
    pub test_command: Vec<String>,
    pub solution_file: String,
    pub test_file: String,
    pub timeout_secs: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            test_command: vec![
                "python3".into(),
                "-m".into(),
                "pytest".into(),
                "-q".into(),
            ],
            solution_file: "solution.py".into(),
            test_file: "test_solution.py".into(),
            timeout_secs: 60,
        }
    }
}

/// Runs the configured test command in a fresh temporary directory per run.
pub struct SubprocessRunner {
    config: RunnerConfig,
}

impl SubprocessRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    async fn execute(&self, dir: &Path) -> Result<TestRun, RunnerError> {
        let (program, args) = self
            .config
            .test_command
            .split_first()
            .ok_or(RunnerError::EmptyCommand)?;

        let child = Command::new(program)
            .args(args)
            .current_dir(dir)
            .kill_on_drop(true)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Dropping the wait future on timeout drops the child, which kills it.
        let timeout = Duration::from_secs(self.config.timeout_secs);
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => return Err(RunnerError::Timeout(self.config.timeout_secs)),
        };

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.is_empty() {
            if !combined.is_empty() && !combined.ends_with('\n') {
                combined.push('\n');
            }
            combined.push_str(&stderr);
        }

        Ok(TestRun {
            passed: output.status.success(),
            exit_code: output.status.code(),
            output: combined,
        })
    }
}

#[async_trait::async_trait]
impl TestRunner for SubprocessRunner {
    async fn run(&self, solution: &str, tests: &str) -> Result<TestRun, RunnerError> {
        let dir = tempfile::TempDir::new()?;
        tokio::fs::write(dir.path().join(&self.config.solution_file), solution).await?;
        tokio::fs::write(dir.path().join(&self.config.test_file), tests).await?;

        debug!(
            "running {:?} in {}",
            self.config.test_command,
            dir.path().display()
        );
        let run = self.execute(dir.path()).await;
        debug!(
            "test run finished: {:?}",
            run.as_ref().map(|r| r.exit_code)
        );
        run
    }
}

/// Keep the tail of long output; failures are usually reported last.
pub fn truncate_feedback(output: &str, max_chars: usize) -> String {
    let count = output.chars().count();
    if count <= max_chars {
        return output.to_string();
    }
    let tail: String = output.chars().skip(count - max_chars).collect();
    format!("...[{} chars truncated]\n{}", count - max_chars, tail)
}
