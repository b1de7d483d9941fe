//! Text rendering for execution and diagnostic reports.

use owo_colors::{OwoColorize, Rgb};

use crate::controller::{ControllerEvent, RetryStep};
use crate::escalation::DiagnosticReport;
use crate::report::ExecutionReport;

use super::Theme;

/// Renders reports as plain or colored console text.
#[derive(Debug, Clone)]
pub struct ReportRenderer {
    theme: Theme,
    use_color: bool,
    /// Panel width (characters)
    width: usize,
}

impl Default for ReportRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportRenderer {
    pub fn new() -> Self {
        Self {
            theme: Theme::default(),
            use_color: true,
            width: 60,
        }
    }

    /// Set whether to use colors.
    pub fn with_color(mut self, use_color: bool) -> Self {
        self.use_color = use_color;
        self
    }

    /// Sets the panel width, never below 20 characters.
    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width.max(20);
        self
    }

    fn paint(&self, text: &str, color: Rgb) -> String {
        if self.use_color {
            text.color(color).to_string()
        } else {
            text.to_string()
        }
    }

    fn paint_bold(&self, text: &str, color: Rgb) -> String {
        if self.use_color {
            text.color(color).bold().to_string()
        } else {
            text.to_string()
        }
    }

    fn rule(&self, ch: char) -> String {
        ch.to_string().repeat(self.width)
    }

    /// Renders the final report: output on success, diagnostic on failure.
    pub fn render_execution(&self, report: &ExecutionReport) -> String {
        let mut out = String::new();
        let rule = self.rule('=');

        if report.succeeded {
            out.push_str(&format!("\n{}\n", self.paint(&rule, self.theme.success)));
            out.push_str(&format!(
                "{} {}\n",
                self.paint_bold("SUCCESS", self.theme.success),
                self.paint(&format!("({})", report.backend_used), self.theme.backend)
            ));
            out.push_str(&format!("{}\n", self.paint(&rule, self.theme.success)));
            if let Some(output) = &report.output {
                out.push_str(output);
                if !output.ends_with('\n') {
                    out.push('\n');
                }
            }
        } else {
            out.push_str(&format!("\n{}\n", self.paint(&rule, self.theme.error)));
            out.push_str(&format!("{}\n", self.paint_bold("FAILED", self.theme.error)));
            out.push_str(&format!("{}\n", self.paint(&rule, self.theme.error)));
            match &report.diagnostic {
                Some(diagnostic) => out.push_str(&self.render_diagnostic(diagnostic)),
                None => out.push_str("Error: Unknown error\n"),
            }
        }

        out
    }

    /// Renders the escalation panel handed to an operator or supervising agent.
    pub fn render_diagnostic(&self, report: &DiagnosticReport) -> String {
        let mut out = String::new();
        let rule = self.rule('─');

        out.push_str(&format!("{}\n", self.paint(&rule, self.theme.warning)));
        out.push_str(&format!(
            " {}\n",
            self.paint_bold(
                &format!("ESCALATION: {}", report.reason.headline()),
                self.theme.warning
            )
        ));
        out.push_str(&format!("{}\n", self.paint(&rule, self.theme.warning)));

        out.push_str(&format!(
            " Last attempted backend: {}\n",
            self.paint(&report.last_backend, self.theme.backend)
        ));
        out.push_str(&format!(" Backends in ranking:    {}\n", report.total_backends));
        out.push_str(&format!(
            " Retries per backend:    {}\n",
            report.retries_per_backend
        ));
        out.push_str(&format!(
            " Cycles completed:       {}/{}\n",
            report.cycles_completed, report.max_rotation_cycles
        ));
        if !report.last_error.is_empty() {
            out.push_str(&format!(
                " Last error:             {}\n",
                self.paint(&report.last_error, self.theme.error)
            ));
        }

        out.push('\n');
        out.push_str(&format!(" {}\n", self.paint_bold("Recommendations:", self.theme.muted)));
        for (i, recommendation) in report.recommendations.iter().enumerate() {
            out.push_str(&format!("   {}. {}\n", i + 1, recommendation));
        }

        out.push('\n');
        out.push_str(&format!(
            " Time until quota reset: approximately {} hours\n",
            report.hours_until_reset
        ));
        out.push_str(&format!("{}\n", self.paint(&rule, self.theme.warning)));
        out
    }

    /// One-line progress message for an event, if it deserves one.
    pub fn render_event(&self, event: &ControllerEvent) -> Option<String> {
        match event {
            ControllerEvent::Attempting {
                backend, attempt, ..
            } => Some(format!(
                "Attempting {} (attempt {})",
                self.paint(backend, self.theme.backend),
                attempt
            )),
            ControllerEvent::Retrying {
                failed_backend,
                next_backend,
                step,
                backoff,
                ..
            } => {
                let action = match step {
                    RetryStep::SameBackend => format!("retrying {}", next_backend),
                    RetryStep::NextBackend => {
                        format!("falling back from {} to {}", failed_backend, next_backend)
                    }
                    RetryStep::NewCycle => format!("cycling back to {}", next_backend),
                };
                Some(self.paint(
                    &format!("Quota hit: {} in {}s", action, backoff.as_secs()),
                    self.theme.warning,
                ))
            }
            ControllerEvent::Restarting => {
                Some(self.paint("Restarting from the first backend", self.theme.muted))
            }
            ControllerEvent::Succeeded { .. } | ControllerEvent::Escalated { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EscalationReason;
    use std::time::Duration;

    fn diagnostic() -> DiagnosticReport {
        DiagnosticReport {
            reason: EscalationReason::RotationExhausted,
            last_backend: "gemini-1.5-flash".to_string(),
            total_backends: 6,
            retries_per_backend: 3,
            cycles_completed: 3,
            max_rotation_cycles: 3,
            last_error: "429 quota exceeded".to_string(),
            hours_until_reset: 7,
            recommendations: vec!["Wait".to_string(), "Upgrade".to_string()],
        }
    }

    fn plain() -> ReportRenderer {
        ReportRenderer::new().with_color(false)
    }

    #[test]
    fn test_render_diagnostic_plain() {
        let text = plain().render_diagnostic(&diagnostic());
        assert!(text.contains("ESCALATION: All backends exhausted"));
        assert!(text.contains("Last attempted backend: gemini-1.5-flash"));
        assert!(text.contains("Backends in ranking:    6"));
        assert!(text.contains("Cycles completed:       3/3"));
        assert!(text.contains("Last error:             429 quota exceeded"));
        assert!(text.contains("   2. Upgrade"));
        assert!(text.contains("approximately 7 hours"));
        assert!(!text.contains('\u{1b}'));
    }

    #[test]
    fn test_render_success() {
        let report = ExecutionReport::succeeded("gemini-2.5-pro", "the answer", false, 0, 1);
        let text = plain().render_execution(&report);
        assert!(text.contains("SUCCESS (gemini-2.5-pro)"));
        assert!(text.ends_with("the answer\n"));
    }

    #[test]
    fn test_render_failure_includes_diagnostic() {
        let report = ExecutionReport::escalated(diagnostic(), true, 54);
        let text = plain().render_execution(&report);
        assert!(text.contains("FAILED"));
        assert!(text.contains("ESCALATION"));
    }

    #[test]
    fn test_colored_output_has_ansi() {
        let text = ReportRenderer::new().render_diagnostic(&diagnostic());
        assert!(text.contains('\u{1b}'));
    }

    #[test]
    fn test_width_floor() {
        let text = plain().with_width(3).render_diagnostic(&diagnostic());
        assert!(text.starts_with(&"─".repeat(20)));
    }

    #[test]
    fn test_render_retry_event() {
        let event = ControllerEvent::Retrying {
            failed_backend: "a".to_string(),
            next_backend: "b".to_string(),
            step: RetryStep::NextBackend,
            backoff: Duration::from_secs(2),
            state: Default::default(),
        };
        assert_eq!(
            plain().render_event(&event).as_deref(),
            Some("Quota hit: falling back from a to b in 2s")
        );
    }
}
