//! Engine configuration.

use crate::engine::errors::EngineError;
use crate::engine::factor::MAX_FACTOR_SCOPE;

/// Tunable constants for table synthesis, validation, and ranking.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EngineConfig {
    /// P(disease present) with no information. Shared by every disease.
    pub disease_prior: f64,
    /// P(symptom present) when no causing disease is active.
    pub leak_probability: f64,
    /// P(symptom present) caused by a single active disease on its own.
    pub activation_probability: f64,
    /// P(symptom present) for a symptom with no parent disease.
    pub orphan_symptom_present: f64,
    /// Allowed deviation of a table column sum from 1.0.
    pub normalization_tolerance: f64,
    /// Symptom tables with more parents than this are kept in closed noisy-OR
    /// form instead of being materialized column by column.
    pub max_tabular_parents: usize,
    /// A symptom observed present with at least this many unobserved parents
    /// is expanded by inclusion-exclusion instead of becoming one factor over
    /// all of them.
    pub expand_present_parents: usize,
    /// Minimum overlap score for the symptom-overlap ranking.
    pub match_threshold: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            disease_prior: 0.01,
            leak_probability: 0.05,
            activation_probability: 0.85,
            orphan_symptom_present: 0.05,
            normalization_tolerance: 1e-9,
            max_tabular_parents: 16,
            expand_present_parents: 8,
            match_threshold: 0.5,
        }
    }
}

impl EngineConfig {
    pub fn validate(self) -> Result<Self, EngineError> {
        open_unit("disease_prior", self.disease_prior)?;
        open_unit("leak_probability", self.leak_probability)?;
        if !(0.0..1.0).contains(&self.activation_probability) {
            return Err(EngineError::Configuration(format!(
                "activation_probability must be in [0, 1), got {}",
                self.activation_probability
            )));
        }
        closed_unit("orphan_symptom_present", self.orphan_symptom_present)?;
        if self.normalization_tolerance <= 0.0 || !self.normalization_tolerance.is_finite() {
            return Err(EngineError::Configuration(
                "normalization_tolerance must be finite and > 0".into(),
            ));
        }
        if self.max_tabular_parents > MAX_FACTOR_SCOPE {
            return Err(EngineError::Configuration(format!(
                "max_tabular_parents must be <= {}, got {}",
                MAX_FACTOR_SCOPE, self.max_tabular_parents
            )));
        }
        if self.expand_present_parents == 0 || self.expand_present_parents > MAX_FACTOR_SCOPE {
            return Err(EngineError::Configuration(format!(
                "expand_present_parents must be in 1..={}, got {}",
                MAX_FACTOR_SCOPE, self.expand_present_parents
            )));
        }
        validate_threshold(self.match_threshold)?;
        Ok(self)
    }
}

pub(crate) fn validate_threshold(threshold: f64) -> Result<f64, EngineError> {
    closed_unit("match_threshold", threshold)
}

fn open_unit(name: &str, value: f64) -> Result<f64, EngineError> {
    if value > 0.0 && value < 1.0 {
        Ok(value)
    } else {
        Err(EngineError::Configuration(format!(
            "{} must be in (0, 1), got {}",
            name, value
        )))
    }
}

fn closed_unit(name: &str, value: f64) -> Result<f64, EngineError> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(EngineError::Configuration(format!(
            "{} must be in [0, 1], got {}",
            name, value
        )))
    }
}
