//! Rotation state and the transition function.
//!
//! [`transition`] is a pure function from the current [`RotationState`] and an
//! [`InvocationOutcome`] to the next state plus the [`Action`] the driver must
//! take. It never sleeps or invokes anything, so every branch of the fallback
//! policy can be tested directly.

use std::time::Duration;

use crate::adapter::InvocationOutcome;
use crate::error::{classify, EscalationReason};
use crate::settings::FallbackSettings;

/// Where the controller is in its rotation through the ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RotationState {
    /// Index into the ranking of the backend to invoke next.
    pub active_index: usize,
    /// Quota failures seen on the active backend since it became active.
    pub same_backend_retries: u32,
    /// Completed passes through the whole ranking.
    pub rotation_cycles: u32,
}

impl RotationState {
    /// First backend, no retries, no completed cycles.
    pub const INITIAL: RotationState = RotationState {
        active_index: 0,
        same_backend_retries: 0,
        rotation_cycles: 0,
    };

    /// True once the controller has moved off the first backend or wrapped.
    pub fn rotation_occurred(&self) -> bool {
        self.active_index > 0 || self.rotation_cycles > 0
    }
}

/// Limits and delays applied by the transition function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries_per_backend: u32,
    pub max_rotation_cycles: u32,
    /// Delay before retrying the same backend.
    pub retry_backoff: Duration,
    /// Delay before advancing to another backend or wrapping to a new cycle.
    pub rotate_backoff: Duration,
}

impl RetryPolicy {
    /// Policy with the given limits and no backoff delays.
    pub fn immediate(max_retries_per_backend: u32, max_rotation_cycles: u32) -> Self {
        Self {
            max_retries_per_backend,
            max_rotation_cycles,
            retry_backoff: Duration::ZERO,
            rotate_backoff: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&FallbackSettings::default())
    }
}

impl From<&FallbackSettings> for RetryPolicy {
    fn from(settings: &FallbackSettings) -> Self {
        Self {
            max_retries_per_backend: settings.max_retries_per_backend,
            max_rotation_cycles: settings.max_rotation_cycles,
            retry_backoff: settings.retry_backoff(),
            rotate_backoff: settings.rotate_backoff(),
        }
    }
}

/// Kind of retry chosen after a quota failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryStep {
    /// Try the same backend again.
    SameBackend,
    /// Move to the next backend in the ranking.
    NextBackend,
    /// Wrap back to the first backend and start a new cycle.
    NewCycle,
}

/// What the driver does after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Wait `backoff`, then invoke the backend selected by the new state.
    Retry { step: RetryStep, backoff: Duration },
    /// Stop with a successful report.
    Succeed {
        rotation_occurred: bool,
        cycles_consumed: u32,
    },
    /// Stop and hand over to the escalation notifier.
    Escalate { reason: EscalationReason },
}

impl Action {
    /// True for `Succeed` and `Escalate`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Action::Retry { .. })
    }
}

/// Next state plus the action that goes with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub state: RotationState,
    pub action: Action,
}

/// Applies the fallback policy to one invocation outcome.
///
/// `ranking_len` must be at least 1 and `state.active_index` must be below it.
pub fn transition(
    state: &RotationState,
    outcome: &InvocationOutcome,
    policy: &RetryPolicy,
    ranking_len: usize,
) -> Transition {
    match outcome {
        InvocationOutcome::Success { .. } => Transition {
            state: RotationState::INITIAL,
            action: Action::Succeed {
                rotation_occurred: state.rotation_occurred(),
                cycles_consumed: state.rotation_cycles,
            },
        },
        InvocationOutcome::TimedOut { .. } => escalate(state, EscalationReason::TimedOut),
        InvocationOutcome::Failure { raw_error_text, .. } => {
            if classify(raw_error_text).is_transient() {
                quota_exceeded(state, policy, ranking_len)
            } else {
                escalate(state, EscalationReason::Unrelated)
            }
        }
    }
}

fn escalate(state: &RotationState, reason: EscalationReason) -> Transition {
    Transition {
        state: *state,
        action: Action::Escalate { reason },
    }
}

fn quota_exceeded(state: &RotationState, policy: &RetryPolicy, ranking_len: usize) -> Transition {
    let mut next = *state;
    next.same_backend_retries += 1;

    if next.same_backend_retries < policy.max_retries_per_backend {
        return Transition {
            state: next,
            action: Action::Retry {
                step: RetryStep::SameBackend,
                backoff: policy.retry_backoff,
            },
        };
    }

    next.same_backend_retries = 0;
    if next.active_index + 1 < ranking_len {
        next.active_index += 1;
        return Transition {
            state: next,
            action: Action::Retry {
                step: RetryStep::NextBackend,
                backoff: policy.rotate_backoff,
            },
        };
    }

    next.active_index = 0;
    next.rotation_cycles += 1;
    let action = if next.rotation_cycles < policy.max_rotation_cycles {
        Action::Retry {
            step: RetryStep::NewCycle,
            backoff: policy.rotate_backoff,
        }
    } else {
        Action::Escalate {
            reason: EscalationReason::RotationExhausted,
        }
    };
    Transition { state: next, action }
}
