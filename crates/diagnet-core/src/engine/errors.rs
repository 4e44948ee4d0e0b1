//! Error types for model construction and diagnosis.

use std::fmt;

use thiserror::Error;

/// Errors raised by the diagnosis engine.
///
/// The variants follow how far a failure propagates:
///
/// - [`EngineError::Structural`] aborts a model build; the previously published
///   model stays in service.
/// - [`EngineError::QueryFailure`] is local to one target variable. Batched
///   diagnosis turns it into a [`QueryFailure`] diagnostic instead of failing.
/// - [`EngineError::Configuration`] is a blocking precondition failure, e.g.
///   diagnosing before any model was built or passing an out-of-range threshold.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in the future without breaking changes.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// The assembled structure and tables do not form a valid network.
    #[error("structural error: {0}")]
    Structural(String),

    /// Exact inference for a single target variable failed.
    #[error("query failure for '{variable}': {reason}")]
    QueryFailure { variable: String, reason: String },

    /// The engine is not ready or was given unusable settings.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Numerical stability error (NaN/Inf, invalid probabilities).
    #[error("numerical error: {0}")]
    Numerical(String),

    /// Internal error (programmer error, not user error).
    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    pub(crate) fn query(variable: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::QueryFailure {
            variable: variable.into(),
            reason: reason.into(),
        }
    }
}

/// Diagnostic for one disease whose posterior could not be computed.
///
/// A failed query means "unknown". It is never reported as probability 0.0.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QueryFailure {
    pub disease: String,
    pub reason: String,
}

impl fmt::Display for QueryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.disease, self.reason)
    }
}

impl QueryFailure {
    pub(crate) fn from_error(disease: &str, err: EngineError) -> Self {
        let reason = match err {
            EngineError::QueryFailure { reason, .. } => reason,
            other => other.to_string(),
        };
        Self {
            disease: disease.to_string(),
            reason,
        }
    }
}
