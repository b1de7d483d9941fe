//! Failure classes and escalation reasons.
//!
//! A `FailureClass` is derived from raw error text each time it is needed and
//! never stored. An `EscalationReason` records why the controller stopped
//! attempting backends.

use serde::Serialize;

/// Classification of a failed invocation's error text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailureClass {
    /// Quota or rate-limit condition; transient, retried with backoff and rotation.
    QuotaExceeded,
    /// Any other failure; treated as non-transient.
    Unrelated,
}

impl FailureClass {
    /// Returns true if this failure is worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, FailureClass::QuotaExceeded)
    }
}

/// Why a run ended in escalation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationReason {
    /// The backend failed for a reason other than quota.
    Unrelated,
    /// The backend did not answer within the per-call timeout.
    TimedOut,
    /// Every backend hit its quota across all permitted rotation cycles.
    RotationExhausted,
}

impl EscalationReason {
    /// Short human-readable headline for reports.
    pub fn headline(&self) -> &'static str {
        match self {
            EscalationReason::Unrelated => "Backend failed with a non-quota error",
            EscalationReason::TimedOut => "Backend timed out",
            EscalationReason::RotationExhausted => "All backends exhausted",
        }
    }
}

impl std::fmt::Display for EscalationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            EscalationReason::Unrelated => "unrelated",
            EscalationReason::TimedOut => "timed_out",
            EscalationReason::RotationExhausted => "rotation_exhausted",
        };
        f.write_str(label)
    }
}
