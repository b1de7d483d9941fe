//! Backend ranking table.
//!
//! The ranking is an immutable, ordered list of interchangeable backend model
//! identifiers. Index 0 is the most preferred backend; the controller only ever
//! reads from it.

use std::collections::HashSet;

use thiserror::Error;

/// Production ranking, most capable model first.
pub const DEFAULT_BACKENDS: &[&str] = &[
    "gemini-2.5-pro",
    "gemini-2.5-flash",
    "gemini-2.5-flash-preview-09-2025",
    "gemini-2.5-flash-lite",
    "gemini-1.5-pro",
    "gemini-1.5-flash",
];

/// Errors raised when building a ranking from an arbitrary list.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RankingError {
    /// The ranking has no entries.
    #[error("backend ranking must contain at least one backend")]
    Empty,

    /// The same identifier appears more than once.
    #[error("duplicate backend in ranking: {0}")]
    Duplicate(String),
}

/// Ordered, non-empty list of unique backend identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendRanking {
    backends: Vec<String>,
}

impl BackendRanking {
    /// Builds a ranking, rejecting empty lists and duplicate identifiers.
    pub fn new<I, S>(backends: I) -> Result<Self, RankingError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let backends: Vec<String> = backends.into_iter().map(Into::into).collect();
        if backends.is_empty() {
            return Err(RankingError::Empty);
        }

        let mut seen = HashSet::with_capacity(backends.len());
        for backend in &backends {
            if !seen.insert(backend.as_str()) {
                return Err(RankingError::Duplicate(backend.clone()));
            }
        }

        Ok(Self { backends })
    }

    /// Number of backends in the ranking.
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// Always false; a ranking cannot be constructed empty.
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Backends as owned identifiers, indexed by rotation position.
    pub fn as_slice(&self) -> &[String] {
        &self.backends
    }
}

impl Default for BackendRanking {
    fn default() -> Self {
        Self {
            backends: DEFAULT_BACKENDS.iter().map(|b| b.to_string()).collect(),
        }
    }
}
