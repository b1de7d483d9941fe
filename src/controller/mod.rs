//! Fallback controller.
//!
//! Drives the ranked backends through an [`ExecutionAdapter`] until one
//! succeeds or the controller escalates. Every decision is made by the pure
//! [`transition`] function; this module only performs the invocations and
//! backoff waits it asks for, reports progress, and handles the supervised
//! restart loop.

pub mod state;

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::adapter::{ExecutionAdapter, InvocationOutcome};
use crate::error::{classifier, EscalationReason};
use crate::escalation::{
    DiagnosticReport, EscalationDecision, EscalationNotifier, OperatorPrompt, StdinPrompt,
};
use crate::ranking::BackendRanking;
use crate::report::ExecutionReport;
use crate::settings::{FallbackSettings, RunMode};

pub use state::{transition, Action, RetryPolicy, RetryStep, RotationState, Transition};

/// Progress event emitted while the controller runs.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    /// About to invoke `backend`.
    Attempting {
        backend: String,
        attempt: u32,
        state: RotationState,
    },
    /// A quota failure was absorbed; the controller waits `backoff` before
    /// invoking `next_backend`.
    Retrying {
        failed_backend: String,
        next_backend: String,
        step: RetryStep,
        backoff: Duration,
        state: RotationState,
    },
    /// `backend` produced output.
    Succeeded { backend: String, attempts: u32 },
    /// The controller gave up; the report is ready for presentation.
    Escalated { report: DiagnosticReport },
    /// An operator asked to start over from the first backend.
    Restarting,
}

/// Callback type for controller events.
pub type OnControllerEvent = Box<dyn FnMut(&ControllerEvent) + Send>;

/// Command fed into the controller from outside the transition function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerCommand {
    /// Reset rotation state to the initial state.
    Restart,
}

/// The fallback/retry controller.
pub struct FallbackController<A> {
    ranking: BackendRanking,
    adapter: A,
    policy: RetryPolicy,
    timeout: Duration,
    mode: RunMode,
    notifier: EscalationNotifier,
    prompt: Box<dyn OperatorPrompt>,
    on_event: Option<OnControllerEvent>,
    state: RotationState,
}

impl<A: ExecutionAdapter> FallbackController<A> {
    /// Creates a controller from loaded settings.
    pub fn new(ranking: BackendRanking, adapter: A, settings: &FallbackSettings) -> Self {
        let notifier = EscalationNotifier::new(&ranking, settings);
        Self {
            ranking,
            adapter,
            policy: RetryPolicy::from(settings),
            timeout: settings.timeout(),
            mode: settings.mode,
            notifier,
            prompt: Box::new(StdinPrompt::new()),
            on_event: None,
            state: RotationState::INITIAL,
        }
    }

    /// Overrides the retry policy derived from settings.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Overrides the escalation mode from settings.
    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    /// Replaces the stdin prompt used in supervised mode.
    pub fn with_operator_prompt(mut self, prompt: impl OperatorPrompt + 'static) -> Self {
        self.prompt = Box::new(prompt);
        self
    }

    /// Registers a progress callback.
    pub fn on_event(mut self, callback: impl FnMut(&ControllerEvent) + Send + 'static) -> Self {
        self.on_event = Some(Box::new(callback));
        self
    }

    /// Current rotation state.
    pub fn state(&self) -> RotationState {
        self.state
    }

    /// Applies an external command to the controller.
    pub fn handle(&mut self, command: ControllerCommand) {
        match command {
            ControllerCommand::Restart => {
                self.state = RotationState::INITIAL;
                self.emit(ControllerEvent::Restarting);
            }
        }
    }

    /// Runs `prompt` until a backend succeeds or the controller escalates.
    pub async fn run(&mut self, prompt: &str) -> ExecutionReport {
        self.state = RotationState::INITIAL;
        let mut attempts: u32 = 0;

        loop {
            let backend = self.ranking.as_slice()[self.state.active_index].clone();
            attempts += 1;
            info!(
                backend = %backend,
                cycle = self.state.rotation_cycles + 1,
                max_cycles = self.policy.max_rotation_cycles,
                retry = self.state.same_backend_retries + 1,
                max_retries = self.policy.max_retries_per_backend,
                index = self.state.active_index + 1,
                backends = self.ranking.len(),
                "attempting backend"
            );
            self.emit(ControllerEvent::Attempting {
                backend: backend.clone(),
                attempt: attempts,
                state: self.state,
            });

            let outcome = self.adapter.invoke(&backend, prompt, self.timeout).await;
            let previous = self.state;
            let Transition { state, action } =
                transition(&previous, &outcome, &self.policy, self.ranking.len());
            self.state = state;

            match action {
                Action::Retry { step, backoff } => {
                    self.log_retry(&outcome, step, backoff);
                    let next_backend = self.ranking.as_slice()[self.state.active_index].clone();
                    self.emit(ControllerEvent::Retrying {
                        failed_backend: backend,
                        next_backend,
                        step,
                        backoff,
                        state: self.state,
                    });
                    if !backoff.is_zero() {
                        tokio::time::sleep(backoff).await;
                    }
                }
                Action::Succeed {
                    rotation_occurred,
                    cycles_consumed,
                } => {
                    info!(backend = %backend, attempts, rotation_occurred, "backend succeeded");
                    self.emit(ControllerEvent::Succeeded {
                        backend: backend.clone(),
                        attempts,
                    });
                    let stdout = match outcome {
                        InvocationOutcome::Success { stdout, .. } => stdout,
                        _ => String::new(),
                    };
                    return ExecutionReport::succeeded(
                        backend,
                        stdout,
                        rotation_occurred,
                        cycles_consumed,
                        attempts,
                    );
                }
                Action::Escalate { reason } => {
                    let report = self.notifier.build(reason, &outcome, &self.state);
                    warn!(
                        reason = %reason,
                        backend = %report.last_backend,
                        cycles = report.cycles_completed,
                        "escalating"
                    );
                    self.emit(ControllerEvent::Escalated {
                        report: report.clone(),
                    });

                    if self.mode == RunMode::Supervised
                        && self.notifier.solicit(&mut *self.prompt).await
                            == EscalationDecision::Restart
                    {
                        info!("operator requested restart");
                        self.handle(ControllerCommand::Restart);
                        attempts = 0;
                        continue;
                    }

                    let rotation_occurred = reason == EscalationReason::RotationExhausted
                        || previous.rotation_occurred();
                    return ExecutionReport::escalated(report, rotation_occurred, attempts);
                }
            }
        }
    }

    fn log_retry(&self, outcome: &InvocationOutcome, step: RetryStep, backoff: Duration) {
        let indicator = match outcome {
            InvocationOutcome::Failure { raw_error_text, .. } => {
                classifier::shared().matched_indicator(raw_error_text)
            }
            _ => None,
        };
        debug!(
            backend = outcome.backend(),
            indicator = indicator.unwrap_or("-"),
            "quota condition detected"
        );
        match step {
            RetryStep::SameBackend => info!(
                backend = outcome.backend(),
                backoff_secs = backoff.as_secs(),
                "retrying same backend"
            ),
            RetryStep::NextBackend => info!(
                from = outcome.backend(),
                to = %self.ranking.as_slice()[self.state.active_index],
                "falling back to next backend"
            ),
            RetryStep::NewCycle => info!(
                cycle = self.state.rotation_cycles + 1,
                "cycling back to first backend"
            ),
        }
    }

    fn emit(&mut self, event: ControllerEvent) {
        if let Some(callback) = self.on_event.as_mut() {
            callback(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    /// Adapter that replays scripted results and records which backends ran.
    struct ScriptedAdapter {
        script: Mutex<VecDeque<Scripted>>,
        calls: Arc<Mutex<Vec<String>>>,
    }

    enum Scripted {
        Ok(&'static str),
        Err(&'static str),
        Timeout,
    }

    impl ScriptedAdapter {
        fn new(script: Vec<Scripted>) -> (Self, Arc<Mutex<Vec<String>>>) {
            let calls = Arc::new(Mutex::new(Vec::new()));
            let adapter = Self {
                script: Mutex::new(script.into()),
                calls: Arc::clone(&calls),
            };
            (adapter, calls)
        }
    }

    #[async_trait]
    impl ExecutionAdapter for ScriptedAdapter {
        async fn invoke(
            &self,
            backend: &str,
            _prompt: &str,
            timeout: Duration,
        ) -> InvocationOutcome {
            self.calls.lock().unwrap().push(backend.to_string());
            match self.script.lock().unwrap().pop_front() {
                Some(Scripted::Ok(out)) => InvocationOutcome::success(backend, out),
                Some(Scripted::Err(text)) => InvocationOutcome::failure(backend, text, Some(1)),
                Some(Scripted::Timeout) => InvocationOutcome::timed_out(backend, timeout),
                None => panic!("script exhausted"),
            }
        }
    }

    struct ScriptedPrompt(VecDeque<&'static str>);

    #[async_trait]
    impl OperatorPrompt for ScriptedPrompt {
        async fn read_line(&mut self, _message: &str) -> io::Result<Option<String>> {
            Ok(self.0.pop_front().map(str::to_string))
        }
    }

    fn controller(
        backends: &[&str],
        retries: u32,
        cycles: u32,
        script: Vec<Scripted>,
    ) -> (FallbackController<ScriptedAdapter>, Arc<Mutex<Vec<String>>>) {
        let ranking = BackendRanking::new(backends.iter().copied()).unwrap();
        let (adapter, calls) = ScriptedAdapter::new(script);
        let settings = FallbackSettings {
            max_retries_per_backend: retries,
            max_rotation_cycles: cycles,
            retry_backoff_secs: 0,
            rotate_backoff_secs: 0,
            ..FallbackSettings::default()
        };
        (FallbackController::new(ranking, adapter, &settings), calls)
    }

    #[tokio::test]
    async fn test_first_backend_success() {
        let (mut ctl, calls) = controller(&["a", "b"], 3, 3, vec![Scripted::Ok("done")]);
        let report = ctl.run("hi").await;

        assert!(report.succeeded);
        assert_eq!(report.output.as_deref(), Some("done"));
        assert!(!report.rotation_occurred);
        assert_eq!(report.attempts, 1);
        assert_eq!(*calls.lock().unwrap(), vec!["a"]);
        assert_eq!(ctl.state(), RotationState::INITIAL);
    }

    #[tokio::test]
    async fn test_two_backends_exhaust_after_two_calls() {
        let (mut ctl, calls) = controller(
            &["a", "b"],
            1,
            1,
            vec![Scripted::Err("quota exceeded"), Scripted::Err("quota exceeded")],
        );
        let report = ctl.run("hi").await;

        assert!(!report.succeeded);
        assert_eq!(report.attempts, 2);
        assert_eq!(*calls.lock().unwrap(), vec!["a", "b"]);
        let diagnostic = report.diagnostic.unwrap();
        assert_eq!(diagnostic.reason, EscalationReason::RotationExhausted);
        assert_eq!(diagnostic.last_backend, "b");
        assert_eq!(diagnostic.cycles_completed, 1);
    }

    #[tokio::test]
    async fn test_fallback_success_reports_rotation() {
        let (mut ctl, calls) = controller(
            &["a", "b", "c"],
            1,
            3,
            vec![Scripted::Err("429"), Scripted::Ok("from b")],
        );
        let report = ctl.run("hi").await;

        assert!(report.succeeded);
        assert_eq!(report.backend_used, "b");
        assert!(report.rotation_occurred);
        assert_eq!(report.cycles_consumed, 0);
        assert_eq!(*calls.lock().unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_unrelated_failure_escalates_without_retry() {
        let (mut ctl, calls) = controller(
            &["a", "b", "c"],
            2,
            3,
            vec![Scripted::Err("permission denied")],
        );
        let report = ctl.run("hi").await;

        assert!(!report.succeeded);
        assert_eq!(report.attempts, 1);
        assert_eq!(calls.lock().unwrap().len(), 1);
        assert_eq!(ctl.state(), RotationState::INITIAL);
        assert_eq!(
            report.diagnostic.unwrap().reason,
            EscalationReason::Unrelated
        );
    }

    #[tokio::test]
    async fn test_timeout_escalates_without_retry() {
        let (mut ctl, _calls) = controller(&["a", "b"], 3, 3, vec![Scripted::Timeout]);
        let report = ctl.run("hi").await;

        assert!(!report.succeeded);
        assert_eq!(report.attempts, 1);
        let diagnostic = report.diagnostic.unwrap();
        assert_eq!(diagnostic.reason, EscalationReason::TimedOut);
        assert_eq!(diagnostic.last_error, "Timeout after 60s");
    }

    #[tokio::test]
    async fn test_events_follow_rotation() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let (ctl, _calls) = controller(
            &["a", "b"],
            2,
            1,
            vec![
                Scripted::Err("rate limit"),
                Scripted::Err("rate limit"),
                Scripted::Ok("ok"),
            ],
        );
        let mut ctl = ctl.on_event(move |event| sink.lock().unwrap().push(event.clone()));
        ctl.run("hi").await;

        let steps: Vec<RetryStep> = events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                ControllerEvent::Retrying { step, .. } => Some(*step),
                _ => None,
            })
            .collect();
        assert_eq!(steps, vec![RetryStep::SameBackend, RetryStep::NextBackend]);
        assert!(matches!(
            events.lock().unwrap().last(),
            Some(ControllerEvent::Succeeded { backend, attempts: 3 }) if backend == "b"
        ));
    }

    #[tokio::test]
    async fn test_supervised_restart_reenters_initial_state() {
        let (ctl, calls) = controller(
            &["a"],
            1,
            1,
            vec![Scripted::Err("quota"), Scripted::Ok("second try")],
        );
        let mut ctl = ctl
            .with_mode(RunMode::Supervised)
            .with_operator_prompt(ScriptedPrompt(VecDeque::from(["retry"])));
        let report = ctl.run("hi").await;

        assert!(report.succeeded);
        assert_eq!(report.attempts, 1);
        assert!(!report.rotation_occurred);
        assert_eq!(*calls.lock().unwrap(), vec!["a", "a"]);
    }

    #[tokio::test]
    async fn test_supervised_terminate_on_other_input() {
        let (ctl, _calls) = controller(&["a"], 1, 1, vec![Scripted::Err("quota")]);
        let mut ctl = ctl
            .with_mode(RunMode::Supervised)
            .with_operator_prompt(ScriptedPrompt(VecDeque::from(["no"])));
        let report = ctl.run("hi").await;

        assert!(!report.succeeded);
        assert!(report.diagnostic.is_some());
    }

    #[test]
    fn test_restart_command_resets_state() {
        let (mut ctl, _calls) = controller(&["a", "b"], 1, 1, vec![]);
        ctl.state = RotationState {
            active_index: 1,
            same_backend_retries: 0,
            rotation_cycles: 0,
        };
        ctl.handle(ControllerCommand::Restart);
        assert_eq!(ctl.state(), RotationState::INITIAL);
    }
}
