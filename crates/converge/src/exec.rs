//! Subprocess execution with captured output.
//!
//! The [`Executor`] trait is the seam between resource modules and the
//! machine: the real [`SystemExecutor`] spawns child processes, while
//! tests swap in [`crate::testing::FakeExecutor`] for deterministic,
//! side-effect-free runs.

use std::path::PathBuf;
use std::process::Command;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A request to run one external program.
///
/// The command string is split on whitespace into a program name and
/// arguments. No shell is involved: there is no quoting, globbing, or
/// pipeline syntax, so an argument containing a space cannot be expressed.
#[derive(Debug, Clone, Default)]
pub struct ExecRequest {
    /// Program and arguments, whitespace separated. Must be non-empty.
    pub command: String,
    /// Working directory for the child, if set.
    pub dir: Option<PathBuf>,
    /// `KEY=VALUE` pairs. When non-empty this fully replaces the child's
    /// environment - it is not merged with the caller's. Callers that need
    /// inherited variables (PATH, most of the time) must re-add them.
    pub env: Vec<String>,
}

impl ExecRequest {
    /// Build a request for a command line.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Self::default()
        }
    }

    /// Run the child in the given working directory.
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    /// Replace the child's environment with the given `KEY=VALUE` pairs.
    pub fn with_env(mut self, env: Vec<String>) -> Self {
        self.env = env;
        self
    }
}

/// Captured outcome of one executed command.
///
/// Immutable once returned. A non-zero exit status is *not* an error at
/// this layer - interpreting the status and stderr is the caller's job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecResult {
    /// Everything the child wrote to stdout
    pub stdout: String,
    /// Everything the child wrote to stderr
    pub stderr: String,
    /// The child's exit code (-1 if terminated by signal)
    pub exit_status: i32,
}

/// Capability to run external commands.
///
/// Resource modules hold a `&dyn Executor` and never touch
/// `std::process` directly, so every module can be exercised against a
/// scripted fake.
pub trait Executor: Send + Sync {
    /// Run the program described by `req`, blocking until it exits, and
    /// capture both output streams in full.
    ///
    /// Fails only if the program cannot be located or started, or if
    /// capture fails. There is no timeout: a hung child blocks the caller
    /// indefinitely.
    fn exec(&self, req: &ExecRequest) -> Result<ExecResult>;
}

/// The real executor: spawns exactly one child process per request.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemExecutor;

impl SystemExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl Executor for SystemExecutor {
    fn exec(&self, req: &ExecRequest) -> Result<ExecResult> {
        let mut tokens = req.command.split_whitespace();
        let Some(program) = tokens.next() else {
            return Err(Error::execution("empty command"));
        };

        log::debug!("exec: {}", req.command);

        let mut cmd = Command::new(program);
        cmd.args(tokens);

        if let Some(dir) = &req.dir {
            cmd.current_dir(dir);
        }

        if !req.env.is_empty() {
            cmd.env_clear();
            for pair in &req.env {
                if let Some((key, value)) = pair.split_once('=') {
                    cmd.env(key, value);
                }
            }
        }

        let output = cmd
            .output()
            .map_err(|e| Error::execution(format!("failed to run {program}: {e}")))?;

        Ok(ExecResult {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_status: output.status.code().unwrap_or(-1),
        })
    }
}

/// Verify that every listed program can be found on PATH.
///
/// Modules call this up front so a convergence run fails before any side
/// effect rather than halfway through.
pub fn required_commands(commands: &[&str]) -> Result<()> {
    for command in commands {
        which::which(command)
            .map_err(|_| Error::execution(format!("required command not found: {command}")))?;
    }

    Ok(())
}
