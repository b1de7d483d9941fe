//! Failure classification for backend invocations.
//!
//! This module decides whether a failed invocation is a transient quota or
//! rate-limit condition (worth retrying or rotating) or something unrelated
//! that should escalate straight away.

pub mod classification;
pub mod classifier;

pub use classification::{EscalationReason, FailureClass};
pub use classifier::{classify, ErrorClassifier, IndicatorPattern, QUOTA_INDICATORS};
