//! Command runner abstraction for external tools.
//!
//! `CommandRunner` is the seam every rule uses to reach `kubectl`, `openssl`,
//! `systemctl` and the runtime's hook tools. `ProcessRunner` spawns the
//! program directly (no shell). `MockRunner` records invocations and serves
//! scripted responses.

use std::cell::RefCell;
use std::process::Command;

use tracing::debug;

use crate::error::CommandError;

/// Trait for executing an external program with arguments.
pub trait CommandRunner {
    /// Run `program args...` to completion. Success yields stdout.
    fn run(&self, program: &str, args: &[&str]) -> Result<String, CommandError>;
}

/// Render a program and its arguments as a single display string.
pub fn command_line(program: &str, args: &[&str]) -> String {
    let mut line = program.to_string();
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}

/// Production runner.
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<String, CommandError> {
        let line = command_line(program, args);
        debug!(command = %line, "running");
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|source| CommandError::Spawn {
                command: line.clone(),
                source,
            })?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            Err(CommandError::Failed {
                command: line,
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

/// Test-double runner that records command lines and answers from a table of
/// prefix rules. Later rules take precedence; unmatched commands succeed with
/// empty output.
pub struct MockRunner {
    rules: RefCell<Vec<(String, Result<String, String>)>>,
    commands: RefCell<Vec<String>>,
}

impl MockRunner {
    pub fn new() -> Self {
        MockRunner {
            rules: RefCell::new(Vec::new()),
            commands: RefCell::new(Vec::new()),
        }
    }

    /// Answer commands whose line starts with `prefix` with `stdout`.
    pub fn respond(&self, prefix: &str, stdout: &str) {
        self.rules
            .borrow_mut()
            .push((prefix.to_string(), Ok(stdout.to_string())));
    }

    /// Fail commands whose line starts with `prefix`.
    pub fn fail(&self, prefix: &str, stderr: &str) {
        self.rules
            .borrow_mut()
            .push((prefix.to_string(), Err(stderr.to_string())));
    }

    /// Drop every scripted response.
    pub fn reset_responses(&self) {
        self.rules.borrow_mut().clear();
    }

    pub fn executed_commands(&self) -> Vec<String> {
        self.commands.borrow().clone()
    }

    /// Recorded command lines starting with `prefix`.
    pub fn matching(&self, prefix: &str) -> Vec<String> {
        self.commands
            .borrow()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub fn clear_commands(&self) {
        self.commands.borrow_mut().clear();
    }
}

impl Default for MockRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner for MockRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<String, CommandError> {
        let line = command_line(program, args);
        self.commands.borrow_mut().push(line.clone());
        let rules = self.rules.borrow();
        let answer = rules
            .iter()
            .rev()
            .find(|(prefix, _)| line.starts_with(prefix.as_str()))
            .map(|(_, response)| response.clone());
        match answer {
            None => Ok(String::new()),
            Some(Ok(stdout)) => Ok(stdout),
            Some(Err(stderr)) => Err(CommandError::Failed {
                command: line,
                code: Some(1),
                stderr,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_runner_records_commands() {
        let runner = MockRunner::new();
        runner.run("kubectl", &["apply", "-f", "a.yaml"]).unwrap();
        runner.run("systemctl", &["daemon-reload"]).unwrap();
        assert_eq!(
            runner.executed_commands(),
            vec!["kubectl apply -f a.yaml", "systemctl daemon-reload"]
        );
    }

    #[test]
    fn mock_runner_defaults_to_empty_ok() {
        let runner = MockRunner::new();
        assert_eq!(runner.run("anything", &[]).unwrap(), "");
    }

    #[test]
    fn later_rules_take_precedence() {
        let runner = MockRunner::new();
        runner.fail("kubectl apply", "connection refused");
        assert!(runner.run("kubectl", &["apply", "-f", "x"]).is_err());
        runner.respond("kubectl apply", "created");
        assert_eq!(runner.run("kubectl", &["apply", "-f", "x"]).unwrap(), "created");
    }

    #[test]
    fn failures_carry_command_and_stderr() {
        let runner = MockRunner::new();
        runner.fail("openssl", "unable to write key");
        match runner.run("openssl", &["genrsa", "2048"]).unwrap_err() {
            CommandError::Failed { command, stderr, .. } => {
                assert_eq!(command, "openssl genrsa 2048");
                assert_eq!(stderr, "unable to write key");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn matching_filters_by_prefix() {
        let runner = MockRunner::new();
        runner.run("systemctl", &["restart", "kube-apiserver"]).unwrap();
        runner.run("kubectl", &["get", "nodes"]).unwrap();
        runner.run("systemctl", &["restart", "kube-scheduler"]).unwrap();
        assert_eq!(runner.matching("systemctl restart").len(), 2);
    }

    #[test]
    fn process_runner_reports_missing_program() {
        let err = ProcessRunner
            .run("/nonexistent/kubemaster-test-binary", &[])
            .unwrap_err();
        assert!(matches!(err, CommandError::Spawn { .. }));
    }
}
