//! model-fallback - quota-aware fallback across ranked inference backends
//!
//! Runs a prompt through an external inference CLI, rotating through a fixed
//! ranking of backend models whenever the active one reports a quota or
//! rate-limit error, and escalating to an operator once every backend has been
//! exhausted.

pub mod adapter;
pub mod controller;
pub mod error;
pub mod escalation;
pub mod logging;
pub mod ranking;
pub mod report;
pub mod settings;
pub mod ui;

pub use adapter::{CommandAdapter, ExecutionAdapter, InvocationOutcome};
pub use controller::{ControllerCommand, ControllerEvent, FallbackController, RotationState};
pub use error::{classify, EscalationReason, FailureClass};
pub use escalation::{DiagnosticReport, EscalationDecision, EscalationNotifier};
pub use ranking::BackendRanking;
pub use report::ExecutionReport;
pub use settings::{FallbackSettings, RunMode};
