//! Execution adapter boundary.
//!
//! The controller never spawns processes itself. It asks an
//! [`ExecutionAdapter`] to run one backend and gets back an
//! [`InvocationOutcome`] describing what happened.

pub mod process;

use std::time::Duration;

use async_trait::async_trait;

pub use process::CommandAdapter;

/// Result of invoking a single backend once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationOutcome {
    /// The backend exited with status 0.
    Success { backend: String, stdout: String },
    /// The backend failed. `exit_status` is `None` when the process could not
    /// be started or was terminated by a signal.
    Failure {
        backend: String,
        raw_error_text: String,
        exit_status: Option<i32>,
    },
    /// The backend did not finish within its wait budget.
    TimedOut {
        backend: String,
        elapsed_budget: Duration,
    },
}

impl InvocationOutcome {
    /// Outcome for a backend that exited cleanly with `stdout`.
    pub fn success(backend: impl Into<String>, stdout: impl Into<String>) -> Self {
        Self::Success {
            backend: backend.into(),
            stdout: stdout.into(),
        }
    }

    /// Outcome for a backend that failed; `raw_error_text` is what gets classified.
    pub fn failure(
        backend: impl Into<String>,
        raw_error_text: impl Into<String>,
        exit_status: Option<i32>,
    ) -> Self {
        Self::Failure {
            backend: backend.into(),
            raw_error_text: raw_error_text.into(),
            exit_status,
        }
    }

    /// Outcome for a backend still running when `elapsed_budget` ran out.
    pub fn timed_out(backend: impl Into<String>, elapsed_budget: Duration) -> Self {
        Self::TimedOut {
            backend: backend.into(),
            elapsed_budget,
        }
    }

    /// Backend this outcome came from.
    pub fn backend(&self) -> &str {
        match self {
            Self::Success { backend, .. }
            | Self::Failure { backend, .. }
            | Self::TimedOut { backend, .. } => backend,
        }
    }

    /// Error text suitable for a report, or `None` on success.
    pub fn error_text(&self) -> Option<String> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { raw_error_text, .. } => Some(raw_error_text.clone()),
            Self::TimedOut { elapsed_budget, .. } => {
                Some(format!("Timeout after {}s", elapsed_budget.as_secs()))
            }
        }
    }
}

/// Runs one backend with a prompt under a timeout.
///
/// Implementations must map every failure mode, including spawn errors and
/// timeouts, onto an [`InvocationOutcome`]; they never return a Rust error.
#[async_trait]
pub trait ExecutionAdapter: Send + Sync {
    /// Invokes `backend` with `prompt`, waiting at most `timeout`.
    async fn invoke(&self, backend: &str, prompt: &str, timeout: Duration) -> InvocationOutcome;
}
