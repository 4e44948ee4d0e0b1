//! Error types for knowledge feed parsing.

use std::fmt;

use thiserror::Error;

/// 1-based source position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SourcePosition {
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Why a knowledge line was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LineDefect {
    /// No `has symptoms` / `symptoms include` connector was found.
    MissingConnector,
    /// The text before the connector is empty.
    EmptyDisease,
    /// Every item after the connector is empty.
    EmptySymptomList,
}

impl fmt::Display for LineDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingConnector => write!(f, "expected '<Disease> has symptoms <S1>, <S2>'"),
            Self::EmptyDisease => write!(f, "disease name is empty"),
            Self::EmptySymptomList => write!(f, "no symptoms listed"),
        }
    }
}

/// Errors that can occur while reading the knowledge feed.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FrontendError {
    /// Syntax error reported by the grammar.
    #[error("parse error: {0}")]
    ParseError(String),

    /// The line parsed but does not describe a usable disease entry.
    #[error("invalid knowledge line: {defect}")]
    InvalidLine { defect: LineDefect },

    /// Disease or symptom list rejected by a maintenance operation.
    #[error("validation error: {0}")]
    ValidationError(String),
}

impl FrontendError {
    pub(crate) fn defect(defect: LineDefect) -> Self {
        Self::InvalidLine { defect }
    }

    /// Returns the line defect if this error came from a malformed line.
    pub fn line_defect(&self) -> Option<LineDefect> {
        match self {
            Self::InvalidLine { defect } => Some(*defect),
            _ => None,
        }
    }
}
