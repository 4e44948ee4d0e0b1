//! # Conditional Probability Tables
//!
//! Every variable is binary (absent = 0, present = 1). A table for a variable
//! with parents `p₀ … pₙ₋₁` has `2ⁿ` columns, one per joint parent assignment.
//! Column `i` assigns parent `k` the bit `(i >> (n - 1 - k)) & 1`, so the first
//! parent is the most significant bit.
//!
//! ## Synthesis
//!
//! Diseases get a zero-parent prior table. Symptoms get a noisy-OR table:
//!
//! ```text
//! P(absent | a)  = (1 − leak) × Π_{k : a_k = 1} (1 − q)
//! P(present | a) = 1 − P(absent | a)
//! ```
//!
//! so `P(present | no active parent) = leak`, every column sums to one by
//! construction, and adding an active parent never lowers `P(present)`.
//!
//! Tables with at most [`EngineConfig::max_tabular_parents`] parents are
//! materialized. Larger ones stay in closed form and produce columns on
//! demand; both forms answer [`Cpt::column`] identically.

use smallvec::SmallVec;

use crate::engine::config::EngineConfig;
use crate::engine::network::{NetworkStructure, VariableId};

/// Values of a conditional probability table.
#[derive(Debug, Clone, PartialEq)]
pub enum CptValues {
    /// Explicit columns: `absent[i]` and `present[i]` for column `i`.
    Tabular { absent: Vec<f64>, present: Vec<f64> },
    /// Closed noisy-OR form.
    NoisyOr { leak: f64, activation: f64 },
}

/// Parameters of a noisy-OR table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoisyOrParams {
    pub leak: f64,
    pub activation: f64,
}

/// Conditional probability table of one binary variable.
#[derive(Debug, Clone, PartialEq)]
pub struct Cpt {
    variable: VariableId,
    parents: SmallVec<[VariableId; 4]>,
    values: CptValues,
    /// Set when a materialized table was generated by the noisy-OR rule.
    generator: Option<NoisyOrParams>,
}

impl Cpt {
    /// Zero-parent table with the given P(present).
    pub fn prior(variable: VariableId, present: f64) -> Self {
        Self {
            variable,
            parents: SmallVec::new(),
            values: CptValues::Tabular {
                absent: vec![1.0 - present],
                present: vec![present],
            },
            generator: None,
        }
    }

    /// Explicit table. Values are taken as given; [`crate::engine::validate`]
    /// decides whether they form a usable distribution.
    pub fn tabular(
        variable: VariableId,
        parents: impl IntoIterator<Item = VariableId>,
        absent: Vec<f64>,
        present: Vec<f64>,
    ) -> Self {
        Self {
            variable,
            parents: parents.into_iter().collect(),
            values: CptValues::Tabular { absent, present },
            generator: None,
        }
    }

    /// Closed-form noisy-OR table.
    pub fn noisy_or(
        variable: VariableId,
        parents: impl IntoIterator<Item = VariableId>,
        leak: f64,
        activation: f64,
    ) -> Self {
        Self {
            variable,
            parents: parents.into_iter().collect(),
            values: CptValues::NoisyOr { leak, activation },
            generator: None,
        }
    }

    /// Materialized noisy-OR table.
    pub fn noisy_or_tabular(
        variable: VariableId,
        parents: impl IntoIterator<Item = VariableId>,
        leak: f64,
        activation: f64,
    ) -> Self {
        let parents: SmallVec<[VariableId; 4]> = parents.into_iter().collect();
        let columns = 1usize << parents.len();
        let mut absent = Vec::with_capacity(columns);
        let mut present = Vec::with_capacity(columns);
        for column in 0..columns {
            let p = noisy_or_present(column.count_ones(), leak, activation);
            absent.push(1.0 - p);
            present.push(p);
        }
        Self {
            variable,
            parents,
            values: CptValues::Tabular { absent, present },
            generator: Some(NoisyOrParams { leak, activation }),
        }
    }

    pub fn variable(&self) -> VariableId {
        self.variable
    }

    pub fn parents(&self) -> &[VariableId] {
        &self.parents
    }

    pub fn values(&self) -> &CptValues {
        &self.values
    }

    pub fn is_closed_form(&self) -> bool {
        matches!(self.values, CptValues::NoisyOr { .. })
    }

    /// Leak and activation of a noisy-OR table, closed-form or materialized.
    pub fn noisy_or_params(&self) -> Option<NoisyOrParams> {
        match self.values {
            CptValues::NoisyOr { leak, activation } => Some(NoisyOrParams { leak, activation }),
            CptValues::Tabular { .. } => self.generator,
        }
    }

    /// Number of parent assignments, or `None` when it does not fit in `usize`.
    pub fn column_count(&self) -> Option<usize> {
        1usize.checked_shl(self.parents.len() as u32)
    }

    /// `[P(absent | column), P(present | column)]`.
    ///
    /// Returns `None` for an index outside the table.
    pub fn column(&self, index: usize) -> Option<[f64; 2]> {
        match &self.values {
            CptValues::Tabular { absent, present } => {
                Some([*absent.get(index)?, *present.get(index)?])
            }
            CptValues::NoisyOr { leak, activation } => {
                if self.column_count().is_some_and(|n| index >= n) {
                    return None;
                }
                let p = noisy_or_present(index.count_ones(), *leak, *activation);
                Some([1.0 - p, p])
            }
        }
    }

    /// Probability of `state` given parent states listed in parent order.
    pub fn probability(&self, state: bool, parent_states: &[bool]) -> Option<f64> {
        if parent_states.len() != self.parents.len() {
            return None;
        }
        let index = parent_states
            .iter()
            .fold(0usize, |acc, &on| (acc << 1) | usize::from(on));
        self.column(index).map(|c| c[usize::from(state)])
    }

    /// Bit position of parent `k` inside a column index.
    pub(crate) fn parent_bit(&self, k: usize) -> usize {
        self.parents.len() - 1 - k
    }
}

/// P(present) of a noisy-OR variable with `active` parents switched on.
pub fn noisy_or_present(active: u32, leak: f64, activation: f64) -> f64 {
    if active == 0 {
        // 1 − (1 − leak) is not exactly `leak` in floating point.
        return leak;
    }
    let absent = (1.0 - leak) * (1.0 - activation).powi(active as i32);
    1.0 - absent
}

/// Synthesizes one table per role occurrence in `structure`: a prior table for
/// each disease and a noisy-OR (or orphan fallback) table for each symptom.
///
/// A name registered both as disease and as symptom therefore receives two
/// tables; the validator rejects that.
pub fn synthesize_cpts(structure: &NetworkStructure, config: &EngineConfig) -> Vec<Cpt> {
    let mut cpts = Vec::with_capacity(structure.diseases().len() + structure.symptoms().len());

    for &disease in structure.diseases() {
        cpts.push(Cpt::prior(disease, config.disease_prior));
    }

    for &symptom in structure.symptoms() {
        let parents = structure.parents_of(symptom);
        let cpt = if parents.is_empty() {
            Cpt::prior(symptom, config.orphan_symptom_present)
        } else if parents.len() <= config.max_tabular_parents {
            Cpt::noisy_or_tabular(
                symptom,
                parents.iter().copied(),
                config.leak_probability,
                config.activation_probability,
            )
        } else {
            Cpt::noisy_or(
                symptom,
                parents.iter().copied(),
                config.leak_probability,
                config.activation_probability,
            )
        };
        cpts.push(cpt);
    }

    cpts
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-12;

    fn ids(n: u32) -> Vec<VariableId> {
        (1..=n).map(VariableId).collect()
    }

    #[test]
    fn single_parent_present_matches_closed_form() {
        let cpt = Cpt::noisy_or_tabular(VariableId(0), ids(1), 0.05, 0.85);
        let [absent, present] = cpt.column(1).unwrap();
        assert!((present - 0.8575).abs() < TOL);
        assert!((absent - 0.1425).abs() < TOL);
    }

    #[test]
    fn no_active_parent_yields_leak_exactly() {
        for n in 1..=5 {
            let cpt = Cpt::noisy_or_tabular(VariableId(0), ids(n), 0.05, 0.85);
            assert_eq!(cpt.column(0).unwrap()[1], 0.05);
        }
    }

    #[test]
    fn columns_sum_to_one() {
        let cpt = Cpt::noisy_or_tabular(VariableId(0), ids(4), 0.05, 0.85);
        for i in 0..16 {
            let [a, p] = cpt.column(i).unwrap();
            assert!((a + p - 1.0).abs() < 1e-9);
        }
        assert!(cpt.column(16).is_none());
    }

    #[test]
    fn closed_form_matches_tabular() {
        let tab = Cpt::noisy_or_tabular(VariableId(0), ids(5), 0.05, 0.85);
        let closed = Cpt::noisy_or(VariableId(0), ids(5), 0.05, 0.85);
        for i in 0..32 {
            assert_eq!(tab.column(i), closed.column(i));
        }
        assert!(closed.column(32).is_none());
    }

    #[test]
    fn first_parent_is_most_significant_bit() {
        let cpt = Cpt::tabular(
            VariableId(0),
            ids(2),
            vec![0.9, 0.8, 0.7, 0.6],
            vec![0.1, 0.2, 0.3, 0.4],
        );
        // parent 1 on, parent 2 off -> column 0b10
        assert_eq!(cpt.probability(true, &[true, false]), Some(0.3));
        assert_eq!(cpt.probability(true, &[false, true]), Some(0.2));
        assert_eq!(cpt.probability(true, &[true]), None);
        assert_eq!(cpt.parent_bit(0), 1);
    }

    #[test]
    fn noisy_or_tables_remember_parameters() {
        let tab = Cpt::noisy_or_tabular(VariableId(0), ids(2), 0.05, 0.85);
        let closed = Cpt::noisy_or(VariableId(0), ids(2), 0.05, 0.85);
        assert_eq!(tab.noisy_or_params(), closed.noisy_or_params());
        assert!(Cpt::prior(VariableId(1), 0.01).noisy_or_params().is_none());
    }

    #[test]
    fn prior_table_has_single_column() {
        let cpt = Cpt::prior(VariableId(3), 0.01);
        assert_eq!(cpt.column_count(), Some(1));
        assert_eq!(cpt.column(0), Some([0.99, 0.01]));
        assert!(cpt.parents().is_empty());
    }
}
