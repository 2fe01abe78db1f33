//! Synchronous external-command execution.
//!
//! Every interaction with version-control history goes through
//! [`ProcessRunner`]; no other module spawns processes.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, warn};

use crate::errors::ProcessError;

/// Captured result of a finished process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs one executable inside a fixed working directory.
///
/// Calls block until the child exits. No timeout is applied.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    working_dir: PathBuf,
    program: String,
    env: Vec<(String, String)>,
}

impl ProcessRunner {
    /// Create a runner for `program` executed in `working_dir`.
    pub fn new(working_dir: impl Into<PathBuf>, program: impl Into<String>) -> Self {
        Self {
            working_dir: working_dir.into(),
            program: program.into(),
            env: Vec::new(),
        }
    }

    /// Add an environment variable to every invocation.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Run to completion; a non-zero exit becomes [`ProcessError::CommandFailed`].
    pub fn run(&self, args: &[&str]) -> Result<CommandOutput, ProcessError> {
        let output = self.spawn(args, None)?;
        self.check(args, output)
    }

    /// Like [`run`](Self::run), feeding `input` to the child's stdin.
    pub fn run_with_input(&self, args: &[&str], input: &str) -> Result<CommandOutput, ProcessError> {
        let output = self.spawn(args, Some(input))?;
        self.check(args, output)
    }

    /// Run to completion and return the output whatever the exit status.
    ///
    /// Only spawn and I/O failures are errors here.
    pub fn run_unchecked(&self, args: &[&str]) -> Result<CommandOutput, ProcessError> {
        self.spawn(args, None)
    }

    fn spawn(&self, args: &[&str], input: Option<&str>) -> Result<CommandOutput, ProcessError> {
        let mut cmd = Command::new(&self.program);
        cmd.current_dir(&self.working_dir)
            .args(args)
            .stdin(if input.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        debug!(
            dir = %self.working_dir.display(),
            cmd = %format!("{} {}", self.program, args.join(" ")),
            "running command"
        );

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ProcessError::BinaryNotFound(self.program.clone())
            } else {
                ProcessError::IoError(e)
            }
        })?;

        // Feed stdin from a separate thread so a chatty child cannot fill its
        // stdout pipe while we are still writing.
        let output = std::thread::scope(|scope| {
            let writer = match (input, child.stdin.take()) {
                (Some(data), Some(mut stdin)) => {
                    Some(scope.spawn(move || stdin.write_all(data.as_bytes())))
                }
                _ => None,
            };
            let output = child.wait_with_output();
            if let Some(handle) = writer {
                match handle.join() {
                    // A child that exits early closes the pipe; its exit
                    // status carries the real failure.
                    Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                    Ok(Err(e)) => return Err(e),
                    Ok(Ok(())) | Err(_) => {}
                }
            }
            output
        })?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }

    fn check(&self, args: &[&str], output: CommandOutput) -> Result<CommandOutput, ProcessError> {
        if output.success() {
            return Ok(output);
        }
        warn!(
            program = %self.program,
            exit_code = output.exit_code,
            stderr = %output.stderr.trim(),
            "command failed"
        );
        Err(ProcessError::CommandFailed {
            program: self.program.clone(),
            args: args.join(" "),
            exit_code: output.exit_code,
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_captures_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ProcessRunner::new(dir.path(), "sh");
        let out = runner.run(&["-c", "echo hello"]).unwrap();
        assert_eq!(out.stdout, "hello\n");
        assert!(out.success());
    }

    #[test]
    fn test_non_zero_exit_carries_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ProcessRunner::new(dir.path(), "sh");
        let err = runner.run(&["-c", "echo boom >&2; exit 3"]).unwrap_err();
        match err {
            ProcessError::CommandFailed {
                exit_code, ref stderr, ..
            } => {
                assert_eq!(exit_code, 3);
                assert_eq!(stderr.trim(), "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.stderr().trim(), "boom");
    }

    #[test]
    fn test_run_unchecked_returns_failed_output() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ProcessRunner::new(dir.path(), "sh");
        let out = runner.run_unchecked(&["-c", "exit 1"]).unwrap();
        assert_eq!(out.exit_code, 1);
    }

    #[test]
    fn test_stdin_and_env() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ProcessRunner::new(dir.path(), "sh").with_env("SHIPSYNC_TEST", "yes");
        let out = runner
            .run_with_input(&["-c", "cat; echo $SHIPSYNC_TEST"], "piped\n")
            .unwrap();
        assert_eq!(out.stdout, "piped\nyes\n");
    }

    #[test]
    fn test_missing_binary() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ProcessRunner::new(dir.path(), "definitely-not-a-real-binary-xyz");
        assert!(matches!(
            runner.run(&[]),
            Err(ProcessError::BinaryNotFound(_))
        ));
    }
}
