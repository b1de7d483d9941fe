//! Terminal result of a controller run.

use serde::Serialize;

use crate::escalation::DiagnosticReport;

/// Outcome handed back to the caller once the controller stops.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionReport {
    pub succeeded: bool,
    /// Backend that produced the output, or the last one attempted on failure.
    pub backend_used: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Whether the run moved off the first backend or wrapped a cycle.
    pub rotation_occurred: bool,
    pub cycles_consumed: u32,
    /// Invocations made since the run (or the last operator restart) began.
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<DiagnosticReport>,
}

impl ExecutionReport {
    /// Report for a backend that produced `output`.
    pub fn succeeded(
        backend_used: impl Into<String>,
        output: impl Into<String>,
        rotation_occurred: bool,
        cycles_consumed: u32,
        attempts: u32,
    ) -> Self {
        Self {
            succeeded: true,
            backend_used: backend_used.into(),
            output: Some(output.into()),
            rotation_occurred,
            cycles_consumed,
            attempts,
            diagnostic: None,
        }
    }

    /// Failed report carrying the escalation diagnostic.
    pub fn escalated(diagnostic: DiagnosticReport, rotation_occurred: bool, attempts: u32) -> Self {
        Self {
            succeeded: false,
            backend_used: diagnostic.last_backend.clone(),
            output: None,
            rotation_occurred,
            cycles_consumed: diagnostic.cycles_completed,
            attempts,
            diagnostic: Some(diagnostic),
        }
    }

    /// Process exit code for this report: 0 on success, 1 otherwise.
    pub fn exit_code(&self) -> u8 {
        if self.succeeded {
            0
        } else {
            1
        }
    }
}
