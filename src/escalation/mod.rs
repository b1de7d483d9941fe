//! Escalation notifier.
//!
//! Builds the [`DiagnosticReport`] handed to a human or supervising agent when
//! the controller gives up, and in supervised mode asks the operator whether to
//! start over.

pub mod prompt;

use chrono::{Local, Timelike};
use serde::Serialize;
use tracing::warn;

use crate::adapter::InvocationOutcome;
use crate::controller::RotationState;
use crate::error::EscalationReason;
use crate::ranking::BackendRanking;
use crate::settings::FallbackSettings;

pub use prompt::{OperatorPrompt, StdinPrompt};

/// Longest slice of the last error kept in a report, in characters.
pub const MAX_ERROR_CHARS: usize = 150;

/// Operator input that requests a restart.
pub const RETRY_TOKEN: &str = "retry";

/// Human-readable summary produced on escalation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticReport {
    pub reason: EscalationReason,
    /// Backend the last invocation went to.
    pub last_backend: String,
    pub total_backends: usize,
    pub retries_per_backend: u32,
    /// Rotation cycles completed when the controller stopped.
    pub cycles_completed: u32,
    pub max_rotation_cycles: u32,
    /// Last error text, truncated to [`MAX_ERROR_CHARS`].
    pub last_error: String,
    /// Best-effort hours until the daily quota reset; not timezone-aware.
    pub hours_until_reset: u32,
    pub recommendations: Vec<String>,
}

/// What the operator asked for after seeing a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationDecision {
    Restart,
    Terminate,
}

/// Builds reports and interprets operator replies.
#[derive(Debug, Clone)]
pub struct EscalationNotifier {
    total_backends: usize,
    retries_per_backend: u32,
    max_rotation_cycles: u32,
    reset_hour: u32,
}

impl EscalationNotifier {
    /// Captures the limits reported in every diagnostic.
    pub fn new(ranking: &BackendRanking, settings: &FallbackSettings) -> Self {
        Self {
            total_backends: ranking.len(),
            retries_per_backend: settings.max_retries_per_backend,
            max_rotation_cycles: settings.max_rotation_cycles,
            reset_hour: settings.reset_hour,
        }
    }

    /// Builds a report using the current local hour.
    pub fn build(
        &self,
        reason: EscalationReason,
        last_outcome: &InvocationOutcome,
        final_state: &RotationState,
    ) -> DiagnosticReport {
        self.build_at(reason, last_outcome, final_state, Local::now().hour())
    }

    /// Builds a report as if the local time were `local_hour`.
    pub fn build_at(
        &self,
        reason: EscalationReason,
        last_outcome: &InvocationOutcome,
        final_state: &RotationState,
        local_hour: u32,
    ) -> DiagnosticReport {
        let hours = hours_until_reset(local_hour, self.reset_hour);
        let last_error = last_outcome
            .error_text()
            .map(|text| truncate_error(&text, MAX_ERROR_CHARS))
            .unwrap_or_default();

        DiagnosticReport {
            reason,
            last_backend: last_outcome.backend().to_string(),
            total_backends: self.total_backends,
            retries_per_backend: self.retries_per_backend,
            cycles_completed: final_state.rotation_cycles,
            max_rotation_cycles: self.max_rotation_cycles,
            last_error,
            hours_until_reset: hours,
            recommendations: recommendations(reason, hours),
        }
    }

    /// Asks the operator for one line and maps it to a decision.
    ///
    /// Read errors are treated like an empty reply.
    pub async fn solicit(&self, prompt: &mut dyn OperatorPrompt) -> EscalationDecision {
        match prompt
            .read_line("Press Enter to exit or type 'retry' to start over: ")
            .await
        {
            Ok(line) => parse_decision(line.as_deref()),
            Err(e) => {
                warn!(error = %e, "failed to read operator input");
                EscalationDecision::Terminate
            }
        }
    }
}

/// Maps a line of operator input (or EOF) to a decision.
pub fn parse_decision(line: Option<&str>) -> EscalationDecision {
    match line {
        Some(line) if line.trim().eq_ignore_ascii_case(RETRY_TOKEN) => EscalationDecision::Restart,
        _ => EscalationDecision::Terminate,
    }
}

/// Hours from `local_hour` until the next `reset_hour`, in `1..=24`.
pub fn hours_until_reset(local_hour: u32, reset_hour: u32) -> u32 {
    24 - ((local_hour % 24 + 24 - reset_hour % 24) % 24)
}

/// Truncates `text` to `max_chars` characters, appending `...` when cut.
pub fn truncate_error(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

fn recommendations(reason: EscalationReason, hours: u32) -> Vec<String> {
    match reason {
        EscalationReason::RotationExhausted => vec![
            "Check the API key quota for the provider account".to_string(),
            format!(
                "Wait for the daily quota reset (approximately {} hours)",
                hours
            ),
            "Upgrade to a paid plan for higher limits".to_string(),
            "Hand the task back to the supervising agent".to_string(),
        ],
        EscalationReason::TimedOut => vec![
            "Increase the per-call timeout or shorten the prompt".to_string(),
            "Check that the inference command is not waiting for input".to_string(),
            "Hand the task back to the supervising agent".to_string(),
        ],
        EscalationReason::Unrelated => vec![
            "Inspect the last error; non-quota failures are not retried".to_string(),
            "Verify the inference command is installed and authenticated".to_string(),
            "Hand the task back to the supervising agent".to_string(),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::time::Duration;

    use async_trait::async_trait;

    fn notifier() -> EscalationNotifier {
        let ranking = BackendRanking::new(["a", "b", "c"]).unwrap();
        EscalationNotifier::new(&ranking, &FallbackSettings::default())
    }

    struct FixedPrompt(io::Result<Option<String>>);

    #[async_trait]
    impl OperatorPrompt for FixedPrompt {
        async fn read_line(&mut self, _message: &str) -> io::Result<Option<String>> {
            std::mem::replace(&mut self.0, Ok(None))
        }
    }

    #[test]
    fn test_hours_until_midnight_reset() {
        assert_eq!(hours_until_reset(0, 0), 24);
        assert_eq!(hours_until_reset(13, 0), 11);
        assert_eq!(hours_until_reset(23, 0), 1);
    }

    #[test]
    fn test_hours_until_custom_reset() {
        assert_eq!(hours_until_reset(5, 8), 3);
        assert_eq!(hours_until_reset(8, 8), 24);
        assert_eq!(hours_until_reset(9, 8), 23);
    }

    #[test]
    fn test_truncate_short_text_unchanged() {
        assert_eq!(truncate_error("  short  ", 150), "short");
    }

    #[test]
    fn test_truncate_long_text() {
        let long = "x".repeat(400);
        let truncated = truncate_error(&long, MAX_ERROR_CHARS);
        assert_eq!(truncated.chars().count(), MAX_ERROR_CHARS + 3);
        assert!(truncated.ends_with("..."));
    }

    #[test]
    fn test_truncate_is_utf8_safe() {
        let text = "ünïcödé ".repeat(40);
        let truncated = truncate_error(&text, 10);
        assert_eq!(truncated.chars().count(), 13);
    }

    #[test]
    fn test_build_exhaustion_report() {
        let outcome = InvocationOutcome::failure("c", "Quota exceeded for model c", Some(1));
        let final_state = RotationState {
            active_index: 0,
            same_backend_retries: 0,
            rotation_cycles: 3,
        };
        let report = notifier().build_at(
            EscalationReason::RotationExhausted,
            &outcome,
            &final_state,
            20,
        );

        assert_eq!(report.reason, EscalationReason::RotationExhausted);
        assert_eq!(report.last_backend, "c");
        assert_eq!(report.total_backends, 3);
        assert_eq!(report.retries_per_backend, 3);
        assert_eq!(report.cycles_completed, 3);
        assert_eq!(report.last_error, "Quota exceeded for model c");
        assert_eq!(report.hours_until_reset, 4);
        assert!(report.recommendations[1].contains("approximately 4 hours"));
    }

    #[test]
    fn test_build_timeout_report() {
        let outcome = InvocationOutcome::timed_out("a", Duration::from_secs(60));
        let report = notifier().build_at(
            EscalationReason::TimedOut,
            &outcome,
            &RotationState::INITIAL,
            0,
        );
        assert_eq!(report.last_error, "Timeout after 60s");
        assert_eq!(report.cycles_completed, 0);
        assert!(report.recommendations[0].contains("timeout"));
    }

    #[test]
    fn test_parse_decision() {
        assert_eq!(parse_decision(Some("retry")), EscalationDecision::Restart);
        assert_eq!(parse_decision(Some("  RETRY\n")), EscalationDecision::Restart);
        assert_eq!(parse_decision(Some("")), EscalationDecision::Terminate);
        assert_eq!(parse_decision(Some("retry please")), EscalationDecision::Terminate);
        assert_eq!(parse_decision(None), EscalationDecision::Terminate);
    }

    #[tokio::test]
    async fn test_solicit_restart() {
        let mut prompt = FixedPrompt(Ok(Some("retry\n".to_string())));
        assert_eq!(
            notifier().solicit(&mut prompt).await,
            EscalationDecision::Restart
        );
    }

    #[tokio::test]
    async fn test_solicit_read_error_terminates() {
        let mut prompt = FixedPrompt(Err(io::Error::new(io::ErrorKind::Other, "closed")));
        assert_eq!(
            notifier().solicit(&mut prompt).await,
            EscalationDecision::Terminate
        );
    }
}
