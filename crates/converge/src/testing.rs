//! Scripted executor for deterministic module tests.
//!
//! Exec-backed resource modules never touch the machine in tests: a
//! [`FakeExecutor`] is loaded with canned responses keyed by command
//! prefix and records every command it was asked to run.

use std::sync::Mutex;

use crate::error::Result;
use crate::exec::{ExecRequest, ExecResult, Executor};

/// An [`Executor`] that replays scripted responses.
///
/// The first scripted entry whose prefix matches the issued command wins.
/// Unscripted commands succeed with empty output and exit status 0, which
/// conveniently models "tool ran, found nothing".
#[derive(Debug, Default)]
pub struct FakeExecutor {
    responses: Vec<(String, ExecResult)>,
    calls: Mutex<Vec<String>>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a full response for commands starting with `prefix`.
    pub fn respond(mut self, prefix: impl Into<String>, result: ExecResult) -> Self {
        self.responses.push((prefix.into(), result));
        self
    }

    /// Script a success response with the given stdout.
    pub fn respond_stdout(self, prefix: impl Into<String>, stdout: impl Into<String>) -> Self {
        self.respond(
            prefix,
            ExecResult {
                stdout: stdout.into(),
                ..ExecResult::default()
            },
        )
    }

    /// Script a response with the given stderr and exit status.
    pub fn respond_stderr(
        self,
        prefix: impl Into<String>,
        stderr: impl Into<String>,
        exit_status: i32,
    ) -> Self {
        self.respond(
            prefix,
            ExecResult {
                stderr: stderr.into(),
                exit_status,
                ..ExecResult::default()
            },
        )
    }

    /// Every command line issued so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("poisoned").clone()
    }
}

impl Executor for FakeExecutor {
    fn exec(&self, req: &ExecRequest) -> Result<ExecResult> {
        self.calls
            .lock()
            .expect("poisoned")
            .push(req.command.clone());

        let result = self
            .responses
            .iter()
            .find(|(prefix, _)| req.command.starts_with(prefix.as_str()))
            .map(|(_, result)| result.clone())
            .unwrap_or_default();

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fake_replays_by_prefix() {
        let exec = FakeExecutor::new()
            .respond_stdout("apt-cache policy vim", "vim:\n  Installed: 2:8.1\n")
            .respond_stderr("apt-get install", "E: broken", 100);

        let hit = exec
            .exec(&ExecRequest::new("apt-cache policy vim"))
            .unwrap();
        assert!(hit.stdout.contains("Installed"));

        let fail = exec
            .exec(&ExecRequest::new("apt-get install -y vim"))
            .unwrap();
        assert_eq!(fail.exit_status, 100);

        let miss = exec.exec(&ExecRequest::new("dpkg -l")).unwrap();
        assert_eq!(miss.stdout, "");
        assert_eq!(miss.exit_status, 0);

        assert_eq!(exec.calls().len(), 3);
    }
}
