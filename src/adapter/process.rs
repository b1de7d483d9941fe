//! Process-backed execution adapter.
//!
//! Spawns the inference CLI as `<program> [args...] --model <backend> -p <prompt>`,
//! captures stdout/stderr, and maps the exit status or a timeout onto an
//! [`InvocationOutcome`].

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::{ExecutionAdapter, InvocationOutcome};

/// Adapter that runs an external inference command per invocation.
#[derive(Debug, Clone)]
pub struct CommandAdapter {
    program: String,
    leading_args: Vec<String>,
}

impl CommandAdapter {
    /// Creates an adapter for `program` with no extra arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    /// Arguments placed before `--model`, e.g. a package name for a launcher.
    pub fn with_leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    fn build_command(&self, backend: &str, prompt: &str) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.leading_args)
            .args(["--model", backend, "-p", prompt])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl ExecutionAdapter for CommandAdapter {
    async fn invoke(&self, backend: &str, prompt: &str, timeout: Duration) -> InvocationOutcome {
        let child = match self.build_command(backend, prompt).spawn() {
            Ok(child) => child,
            Err(e) => {
                return InvocationOutcome::failure(
                    backend,
                    format!("Failed to run {}: {}", self.program, e),
                    None,
                );
            }
        };

        // Dropping the wait future on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return InvocationOutcome::failure(
                    backend,
                    format!("Failed to collect output from {}: {}", self.program, e),
                    None,
                );
            }
            Err(_) => return InvocationOutcome::timed_out(backend, timeout),
        };

        debug!(
            backend,
            status = ?output.status.code(),
            stdout_bytes = output.stdout.len(),
            stderr_bytes = output.stderr.len(),
            "backend process exited"
        );

        if output.status.success() {
            InvocationOutcome::success(backend, String::from_utf8_lossy(&output.stdout))
        } else {
            InvocationOutcome::failure(
                backend,
                String::from_utf8_lossy(&output.stderr),
                output.status.code(),
            )
        }
    }
}
