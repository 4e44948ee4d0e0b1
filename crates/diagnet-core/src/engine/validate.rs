//! Network validation.
//!
//! Checks run in a fixed order and stop at the first failure:
//!
//! 1. every symptom has exactly one table whose parent list equals its parent
//!    set in the edge relation (order-insensitive);
//! 2. every disease has exactly one zero-parent table;
//! 3. every table column is a probability distribution within tolerance;
//! 4. the edge relation is acyclic.
//!
//! Tables that reference an unknown variable are rejected before step 1.

use std::collections::{BTreeSet, VecDeque};

use crate::engine::config::EngineConfig;
use crate::engine::cpd::{Cpt, CptValues};
use crate::engine::errors::EngineError;
use crate::engine::network::{NetworkDraft, NetworkStructure, VariableId};

/// Validates a draft network. Returns the first structural problem found.
pub fn validate_network(draft: &NetworkDraft, config: &EngineConfig) -> Result<(), EngineError> {
    let structure = &draft.structure;
    let variable_count = structure.variables().len();

    let mut tables: Vec<Vec<&Cpt>> = vec![Vec::new(); variable_count];
    for cpt in &draft.cpts {
        let slot = tables.get_mut(cpt.variable().0 as usize).ok_or_else(|| {
            EngineError::Structural(format!(
                "table references unknown variable {:?}",
                cpt.variable()
            ))
        })?;
        if let Some(p) = cpt.parents().iter().find(|p| p.0 as usize >= variable_count) {
            return Err(EngineError::Structural(format!(
                "table for '{}' lists unknown parent {:?}",
                structure.name(cpt.variable()),
                p
            )));
        }
        slot.push(cpt);
    }

    check_symptom_tables(structure, &tables)?;
    check_disease_tables(structure, &tables)?;
    for cpt in &draft.cpts {
        check_normalized(cpt, config.normalization_tolerance).map_err(|reason| {
            EngineError::Structural(format!(
                "table for '{}' is not normalized: {}",
                structure.name(cpt.variable()),
                reason
            ))
        })?;
    }
    check_acyclic(structure)
}

fn check_symptom_tables(
    structure: &NetworkStructure,
    tables: &[Vec<&Cpt>],
) -> Result<(), EngineError> {
    for &symptom in structure.symptoms() {
        let name = structure.name(symptom);
        let expected: BTreeSet<VariableId> =
            structure.parents_of(symptom).iter().copied().collect();
        let matching = tables[symptom.0 as usize]
            .iter()
            .filter(|cpt| cpt.parents().iter().copied().collect::<BTreeSet<_>>() == expected)
            .count();
        let total = tables[symptom.0 as usize].len();
        if total == 0 {
            return Err(EngineError::Structural(format!(
                "symptom '{}' has no table",
                name
            )));
        }
        if total != 1 || matching != 1 {
            return Err(EngineError::Structural(format!(
                "symptom '{}' needs exactly one table over its {} parent(s), found {} table(s), {} matching",
                name,
                expected.len(),
                total,
                matching
            )));
        }
    }
    Ok(())
}

fn check_disease_tables(
    structure: &NetworkStructure,
    tables: &[Vec<&Cpt>],
) -> Result<(), EngineError> {
    for &disease in structure.diseases() {
        let name = structure.name(disease);
        match tables[disease.0 as usize].as_slice() {
            [] => {
                return Err(EngineError::Structural(format!(
                    "disease '{}' has no prior table",
                    name
                )))
            }
            [cpt] if cpt.parents().is_empty() => {}
            [cpt] => {
                return Err(EngineError::Structural(format!(
                    "disease '{}' prior table lists {} parent(s)",
                    name,
                    cpt.parents().len()
                )))
            }
            many => {
                return Err(EngineError::Structural(format!(
                    "disease '{}' has {} tables",
                    name,
                    many.len()
                )))
            }
        }
    }
    Ok(())
}

/// Checks that every column of `cpt` is a distribution over {absent, present}.
///
/// Returns a human-readable reason on failure.
pub fn check_normalized(cpt: &Cpt, tolerance: f64) -> Result<(), String> {
    match cpt.values() {
        CptValues::Tabular { absent, present } => {
            let expected = cpt.column_count().ok_or_else(|| {
                format!("{} parents overflow the column index", cpt.parents().len())
            })?;
            if absent.len() != expected || present.len() != expected {
                return Err(format!(
                    "expected {} columns, found {} absent / {} present",
                    expected,
                    absent.len(),
                    present.len()
                ));
            }
            for (i, (&a, &p)) in absent.iter().zip(present.iter()).enumerate() {
                check_column(i, a, p, tolerance)?;
            }
            Ok(())
        }
        CptValues::NoisyOr { leak, activation } => {
            for (label, v) in [("leak", *leak), ("activation", *activation)] {
                if !v.is_finite() || !(0.0..=1.0).contains(&v) {
                    return Err(format!("{} probability {} outside [0, 1]", label, v));
                }
            }
            Ok(())
        }
    }
}

fn check_column(index: usize, absent: f64, present: f64, tolerance: f64) -> Result<(), String> {
    if !absent.is_finite() || !present.is_finite() {
        return Err(format!("column {} has a non-finite entry", index));
    }
    let in_range = |v: f64| v >= -tolerance && v <= 1.0 + tolerance;
    if !in_range(absent) || !in_range(present) {
        return Err(format!(
            "column {} has an entry outside [0, 1] ({}, {})",
            index, absent, present
        ));
    }
    let sum = absent + present;
    if (sum - 1.0).abs() > tolerance {
        return Err(format!("column {} sums to {}", index, sum));
    }
    Ok(())
}

/// Kahn's algorithm over the edge relation.
fn check_acyclic(structure: &NetworkStructure) -> Result<(), EngineError> {
    let n = structure.variables().len();
    let mut indegree: Vec<usize> = (0..n)
        .map(|i| structure.parents_of(VariableId(i as u32)).len())
        .collect();
    let mut queue: VecDeque<VariableId> = (0..n)
        .filter(|&i| indegree[i] == 0)
        .map(|i| VariableId(i as u32))
        .collect();

    let mut visited = 0usize;
    while let Some(v) = queue.pop_front() {
        visited += 1;
        for &child in structure.children_of(v) {
            let d = &mut indegree[child.0 as usize];
            *d -= 1;
            if *d == 0 {
                queue.push_back(child);
            }
        }
    }

    if visited == n {
        return Ok(());
    }
    let on_cycle: Vec<&str> = (0..n)
        .filter(|&i| indegree[i] > 0)
        .map(|i| structure.name(VariableId(i as u32)))
        .take(5)
        .collect();
    Err(EngineError::Structural(format!(
        "edge relation contains a cycle through {}",
        on_cycle.join(", ")
    )))
}
