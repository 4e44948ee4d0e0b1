//! # Exact Inference
//!
//! Posterior queries by variable elimination over the binary factors of a
//! [`ProbabilisticModel`].
//!
//! ## Query pipeline
//!
//! 1. Evidence is resolved against the model. Observing the target, or a
//!    variable the model does not know, fails the query.
//! 2. Only the ancestral set of the target and the observed variables takes
//!    part; unobserved descendants sum to one and are dropped.
//! 3. Tables are reduced by the evidence. A noisy-OR symptom observed absent
//!    factorizes into one unary factor per free parent, whether its table is
//!    materialized or closed-form.
//! 4. Factors outside the connected component of the target are dropped.
//!    Only the tables that survive this step are checked for normalization.
//!    A malformed symptom table or target prior fails the query; a malformed
//!    prior of another disease is replaced by the configured prior, so one
//!    corrupted disease does not take its neighbours down with it.
//! 5. A noisy-OR symptom observed present with many free parents is expanded
//!    by inclusion-exclusion over `1 - c * prod(1 - q)^a_i`. Every term then
//!    holds unary factors in place of one table over all parents.
//! 6. Remaining variables are eliminated greedily, smallest resulting factor
//!    first. Terms are summed with their signs and the result over the target
//!    is normalized.
//!
//! ## Error Handling
//!
//! Failures are reported as [`EngineError::QueryFailure`] naming the target,
//! or [`EngineError::Numerical`] when values stop being finite or the signed
//! sum cancels below zero. [`diagnose`] collects these per disease instead of
//! aborting.

use std::collections::{BTreeMap, BTreeSet};

#[cfg(feature = "rayon")]
use rayon::prelude::*;
use smallvec::SmallVec;

use crate::engine::errors::{EngineError, QueryFailure};
use crate::engine::factor::Factor;
use crate::engine::network::{ProbabilisticModel, VariableId, VariableRole};
use crate::engine::validate::check_normalized;

/// Upper bound on present symptoms expanded in one query; the query runs
/// `2^k` eliminations for `k` expanded symptoms.
pub const MAX_EXPANDED_SYMPTOMS: usize = 12;

/// Relative size below which a negative inclusion-exclusion total is treated
/// as rounding and clamped to zero.
const CANCELLATION_TOLERANCE: f64 = 1e-9;

/// Observed states keyed by variable name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Evidence {
    observations: BTreeMap<String, bool>,
}

impl Evidence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `name` as present or absent. A later observation of the same
    /// variable replaces the earlier one.
    pub fn observe(&mut self, name: impl Into<String>, present: bool) -> &mut Self {
        self.observations.insert(name.into(), present);
        self
    }

    pub fn with(mut self, name: impl Into<String>, present: bool) -> Self {
        self.observe(name, present);
        self
    }

    /// Evidence over every symptom of `model`: present when listed in
    /// `observed`, absent otherwise. Names the model does not know are ignored.
    pub fn complete<S: AsRef<str>>(model: &ProbabilisticModel, observed: &BTreeSet<S>) -> Self
    where
        S: Ord,
    {
        let present: BTreeSet<&str> = observed.iter().map(|s| s.as_ref()).collect();
        let observations = model
            .symptom_names()
            .into_iter()
            .map(|name| (name.to_string(), present.contains(name)))
            .collect();
        Self { observations }
    }

    pub fn get(&self, name: &str) -> Option<bool> {
        self.observations.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> + '_ {
        self.observations.iter().map(|(k, &v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

/// P(target present | evidence).
pub fn posterior(
    model: &ProbabilisticModel,
    target: &str,
    evidence: &Evidence,
) -> Result<f64, EngineError> {
    posterior_distribution(model, target, evidence).map(|[_, present]| present)
}

/// `[P(absent | evidence), P(present | evidence)]` for `target`.
pub fn posterior_distribution(
    model: &ProbabilisticModel,
    target: &str,
    evidence: &Evidence,
) -> Result<[f64; 2], EngineError> {
    let target_id = model
        .id(target)
        .ok_or_else(|| EngineError::query(target, "unknown target variable"))?;

    let n = model.structure().variables().len();
    let mut observed: Vec<Option<bool>> = vec![None; n];
    for (name, state) in evidence.iter() {
        let id = model.id(name).ok_or_else(|| {
            EngineError::query(target, format!("evidence names unknown variable '{}'", name))
        })?;
        if id == target_id {
            return Err(EngineError::query(target, "target variable is observed"));
        }
        observed[id.index()] = Some(state);
    }

    let relevant = ancestral_set(model, target_id, &observed);
    let pieces = reduce_to_pieces(model, target, &relevant, &observed)?;
    let pieces = connected_to(target_id, pieces, n);
    let fallback = check_tables(model, target, target_id, &pieces)?;
    let (expanded, kept) = split_expansions(model, pieces, &observed);

    let mut base = Vec::with_capacity(kept.len());
    for piece in &kept {
        let factor = if fallback.contains(&piece.table) {
            let prior = model.config().disease_prior;
            Factor::unary(piece.table, 1.0 - prior, prior)
        } else {
            piece
                .to_factor(model, &observed)
                .map_err(|r| EngineError::query(target, r))?
        };
        base.push(factor);
    }

    // Each expanded symptom contributes 1 - c * prod(1 - q)^a_i, so the joint
    // is a signed sum over subsets of them whose terms add only unary factors.
    let mut terms = Vec::with_capacity(1 << expanded.len());
    let mut eliminated = 0;
    for mask in 0..(1usize << expanded.len()) {
        let mut factors = base.clone();
        let mut log_coefficient = 0.0_f64;
        let mut negative = false;
        for (_, e) in expanded
            .iter()
            .enumerate()
            .filter(|(k, _)| (mask >> k) & 1 == 1)
        {
            negative = !negative;
            log_coefficient += e.coefficient.ln();
            factors.extend(
                e.parents
                    .iter()
                    .map(|&p| Factor::unary(p, 1.0, 1.0 - e.activation)),
            );
        }
        if log_coefficient == f64::NEG_INFINITY {
            continue;
        }
        if let Some(marginal) = eliminate(target, target_id, factors)? {
            eliminated = eliminated.max(marginal.eliminated);
            terms.push(SignedTerm {
                negative,
                log_scale: log_coefficient + marginal.log_scale,
                values: marginal.values,
            });
        }
    }
    tracing::debug!(
        "posterior for '{}': {} factors, {} expanded symptoms, {} terms, eliminated {} variables",
        target,
        base.len(),
        expanded.len(),
        terms.len(),
        eliminated
    );

    combine(target, &terms)
}

/// Checks every table behind `pieces`. A malformed table fails the query,
/// except the prior of a disease other than the target, which is replaced by
/// the configured prior. Returns the diseases whose prior was replaced.
fn check_tables(
    model: &ProbabilisticModel,
    target: &str,
    target_id: VariableId,
    pieces: &[Piece],
) -> Result<BTreeSet<VariableId>, EngineError> {
    let mut checked: BTreeSet<VariableId> = BTreeSet::new();
    let mut fallback = BTreeSet::new();
    for piece in pieces {
        if !checked.insert(piece.table) {
            continue;
        }
        let cpt = model
            .cpt(piece.table)
            .ok_or_else(|| EngineError::query(target, "model lacks a table"))?;
        let Err(reason) = check_normalized(cpt, model.config().normalization_tolerance) else {
            continue;
        };
        let other_disease = piece.table != target_id
            && model
                .structure()
                .variable(piece.table)
                .is_some_and(|v| v.role == VariableRole::Disease);
        if !other_disease {
            return Err(EngineError::query(
                target,
                format!("table for '{}' is malformed: {}", model.name(piece.table), reason),
            ));
        }
        tracing::debug!(
            "query for '{}' uses the configured prior for '{}': {}",
            target,
            model.name(piece.table),
            reason
        );
        fallback.insert(piece.table);
    }
    Ok(fallback)
}

/// An observed-present noisy-OR symptom handled by inclusion-exclusion.
#[derive(Debug, Clone)]
struct Expansion {
    /// `(1 - leak) * (1 - q)^k` with `k` parents observed present
    coefficient: f64,
    activation: f64,
    parents: SmallVec<[VariableId; 8]>,
}

/// Splits off the present noisy-OR symptoms with at least
/// `expand_present_parents` free parents, largest first, at most
/// [`MAX_EXPANDED_SYMPTOMS`] of them.
fn split_expansions(
    model: &ProbabilisticModel,
    pieces: Vec<Piece>,
    observed: &[Option<bool>],
) -> (Vec<Expansion>, Vec<Piece>) {
    let threshold = model.config().expand_present_parents;
    let (mut candidates, mut kept): (Vec<Piece>, Vec<Piece>) =
        pieces.into_iter().partition(|piece| {
            matches!(piece.kind, PieceKind::Table)
                && observed[piece.table.index()] == Some(true)
                && piece.scope.len() >= threshold
                && model
                    .cpt(piece.table)
                    .is_some_and(|cpt| cpt.noisy_or_params().is_some())
        });
    candidates.sort_by_key(|piece| (std::cmp::Reverse(piece.scope.len()), piece.table));
    if candidates.len() > MAX_EXPANDED_SYMPTOMS {
        kept.extend(candidates.drain(MAX_EXPANDED_SYMPTOMS..));
    }

    let mut expanded = Vec::with_capacity(candidates.len());
    for piece in candidates {
        let Some(cpt) = model.cpt(piece.table) else {
            continue;
        };
        let Some(params) = cpt.noisy_or_params() else {
            kept.push(piece);
            continue;
        };
        let active = cpt
            .parents()
            .iter()
            .filter(|p| observed.get(p.index()).copied().flatten() == Some(true))
            .count();
        expanded.push(Expansion {
            coefficient: (1.0 - params.leak) * (1.0 - params.activation).powi(active as i32),
            activation: params.activation,
            parents: piece.scope,
        });
    }
    (expanded, kept)
}

/// One inclusion-exclusion term: `±exp(log_scale) * values`.
#[derive(Debug, Clone, Copy)]
struct SignedTerm {
    negative: bool,
    log_scale: f64,
    values: [f64; 2],
}

/// Sums the terms relative to the largest scale and normalizes.
fn combine(target: &str, terms: &[SignedTerm]) -> Result<[f64; 2], EngineError> {
    let zero = || EngineError::query(target, "evidence has zero probability under the model");
    let reference = terms
        .iter()
        .map(|t| t.log_scale)
        .fold(f64::NEG_INFINITY, f64::max);
    if reference == f64::NEG_INFINITY {
        return Err(zero());
    }

    let mut total = [0.0_f64; 2];
    for term in terms {
        let weight = (term.log_scale - reference).exp();
        let sign = if term.negative { -1.0 } else { 1.0 };
        for (acc, v) in total.iter_mut().zip(term.values) {
            *acc += sign * weight * v;
        }
    }

    let z = total[0] + total[1];
    if !z.is_finite() {
        return Err(EngineError::Numerical(format!(
            "posterior mass for '{}' is not finite",
            target
        )));
    }
    if !(z > 0.0) {
        return Err(zero());
    }
    for v in &mut total {
        if *v < 0.0 {
            if *v < -CANCELLATION_TOLERANCE * z {
                return Err(EngineError::Numerical(format!(
                    "inclusion-exclusion for '{}' cancelled to {}",
                    target, v
                )));
            }
            *v = 0.0;
        }
    }
    let z = total[0] + total[1];
    Ok([total[0] / z, total[1] / z])
}

/// Result of querying every disease against the same evidence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PosteriorBatch {
    /// P(present | evidence) for each disease whose query succeeded
    pub posteriors: BTreeMap<String, f64>,
    /// One entry per disease whose query failed
    pub failures: Vec<QueryFailure>,
}

/// Posterior of every disease given that exactly the symptoms in `observed`
/// are present and every other known symptom is absent.
///
/// A failed query is logged and listed in [`PosteriorBatch::failures`]; it
/// never aborts the batch and never shows up as a zero probability.
pub fn diagnose<S: AsRef<str> + Ord>(
    model: &ProbabilisticModel,
    observed: &BTreeSet<S>,
) -> PosteriorBatch {
    let evidence = Evidence::complete(model, observed);
    let diseases: Vec<&str> = model.disease_names().collect();

    #[cfg(feature = "rayon")]
    let results: Vec<(&str, Result<f64, EngineError>)> = diseases
        .par_iter()
        .map(|&d| (d, posterior(model, d, &evidence)))
        .collect();
    #[cfg(not(feature = "rayon"))]
    let results: Vec<(&str, Result<f64, EngineError>)> = diseases
        .iter()
        .map(|&d| (d, posterior(model, d, &evidence)))
        .collect();

    let mut batch = PosteriorBatch::default();
    for (disease, result) in results {
        match result {
            Ok(p) => {
                batch.posteriors.insert(disease.to_string(), p);
            }
            Err(err) => {
                tracing::warn!("posterior query for '{}' failed: {}", disease, err);
                batch.failures.push(QueryFailure::from_error(disease, err));
            }
        }
    }
    batch
}

/// The target, every observed variable, and all of their ancestors.
fn ancestral_set(
    model: &ProbabilisticModel,
    target: VariableId,
    observed: &[Option<bool>],
) -> Vec<bool> {
    let structure = model.structure();
    let mut relevant = vec![false; observed.len()];
    let mut stack: Vec<VariableId> = observed
        .iter()
        .enumerate()
        .filter(|(_, s)| s.is_some())
        .map(|(i, _)| VariableId(i as u32))
        .collect();
    stack.push(target);
    while let Some(v) = stack.pop() {
        if std::mem::replace(&mut relevant[v.index()], true) {
            continue;
        }
        stack.extend(structure.parents_of(v).iter().copied());
    }
    relevant
}

#[derive(Debug, Clone, Copy)]
enum PieceKind {
    /// The whole table restricted to the evidence.
    Table,
    /// `[1, 1 - q]` over one parent of an absent noisy-OR symptom.
    AbsentParent { parent: VariableId, activation: f64 },
}

/// A factor to be built from one table, with its free scope known up front.
#[derive(Debug, Clone)]
struct Piece {
    table: VariableId,
    kind: PieceKind,
    scope: SmallVec<[VariableId; 8]>,
}

impl Piece {
    fn to_factor(
        &self,
        model: &ProbabilisticModel,
        observed: &[Option<bool>],
    ) -> Result<Factor, String> {
        match self.kind {
            PieceKind::Table => {
                let cpt = model.cpt(self.table).ok_or("model lacks a table")?;
                Factor::from_cpt(cpt, |v| observed.get(v.index()).copied().flatten())
            }
            PieceKind::AbsentParent { parent, activation } => {
                Ok(Factor::unary(parent, 1.0, 1.0 - activation))
            }
        }
    }
}

/// Splits every relevant table into the factors it contributes after
/// evidence reduction. Pieces with an empty scope are constants and cancel
/// on normalization, so they are not kept.
fn reduce_to_pieces(
    model: &ProbabilisticModel,
    target: &str,
    relevant: &[bool],
    observed: &[Option<bool>],
) -> Result<Vec<Piece>, EngineError> {
    let n = observed.len();
    let is_free = |v: VariableId| observed.get(v.index()).is_some_and(Option::is_none);
    let mut pieces = Vec::new();

    for idx in (0..n).filter(|&i| relevant[i]) {
        let table = VariableId(idx as u32);
        let cpt = model
            .cpt(table)
            .ok_or_else(|| EngineError::query(target, "model lacks a table"))?;
        if let Some(p) = cpt.parents().iter().find(|p| p.index() >= n) {
            return Err(EngineError::query(
                target,
                format!("table for '{}' lists unknown parent {:?}", model.name(table), p),
            ));
        }

        match (cpt.noisy_or_params(), observed[idx]) {
            (Some(params), Some(false)) => {
                for &parent in cpt.parents().iter().filter(|&&p| is_free(p)) {
                    pieces.push(Piece {
                        table,
                        kind: PieceKind::AbsentParent {
                            parent,
                            activation: params.activation,
                        },
                        scope: SmallVec::from_slice(&[parent]),
                    });
                }
            }
            _ => {
                let mut scope: SmallVec<[VariableId; 8]> = SmallVec::new();
                if is_free(table) {
                    scope.push(table);
                }
                scope.extend(cpt.parents().iter().copied().filter(|&p| is_free(p)));
                scope.sort_unstable();
                scope.dedup();
                if !scope.is_empty() {
                    pieces.push(Piece {
                        table,
                        kind: PieceKind::Table,
                        scope,
                    });
                }
            }
        }
    }
    Ok(pieces)
}

/// Keeps the pieces whose scope lies in the connected component of `target`.
fn connected_to(target: VariableId, pieces: Vec<Piece>, n: usize) -> Vec<Piece> {
    let mut parent: Vec<usize> = (0..n).collect();

    fn find(parent: &mut [usize], mut x: usize) -> usize {
        while parent[x] != x {
            parent[x] = parent[parent[x]];
            x = parent[x];
        }
        x
    }

    for piece in &pieces {
        let Some((first, rest)) = piece.scope.split_first() else {
            continue;
        };
        let root = find(&mut parent, first.index());
        for v in rest {
            let r = find(&mut parent, v.index());
            parent[r] = root;
        }
    }

    let target_root = find(&mut parent, target.index());
    pieces
        .into_iter()
        .filter(|p| {
            p.scope
                .first()
                .is_some_and(|v| find(&mut parent, v.index()) == target_root)
        })
        .collect()
}

/// Unnormalized `[absent, present]` over the target, times `exp(log_scale)`.
#[derive(Debug, Clone, Copy)]
struct Marginal {
    values: [f64; 2],
    log_scale: f64,
    eliminated: usize,
}

/// Sums out every variable except `target_id`. Returns `None` when the
/// factors carry no mass.
fn eliminate(
    target: &str,
    target_id: VariableId,
    mut factors: Vec<Factor>,
) -> Result<Option<Marginal>, EngineError> {
    let mut pending: BTreeSet<VariableId> = factors
        .iter()
        .flat_map(|f| f.scope().iter().copied())
        .filter(|&v| v != target_id)
        .collect();
    let mut log_scale = 0.0_f64;
    let mut eliminated = 0;

    while let Some(var) = next_variable(&pending, &factors) {
        pending.remove(&var);
        let (touching, rest): (Vec<Factor>, Vec<Factor>) =
            factors.into_iter().partition(|f| f.mentions(var));
        factors = rest;

        let mut product = Factor::constant(1.0);
        for f in &touching {
            product = product.product(f).map_err(|r| EngineError::query(target, r))?;
        }
        let mut summed = product.sum_out(var);
        if summed.values().iter().any(|v| !v.is_finite()) {
            return Err(EngineError::Numerical(format!(
                "non-finite factor value in the query for '{}'",
                target
            )));
        }
        // The divisor is carried in log space so signed terms stay comparable.
        match summed.rescale() {
            Some(scale) => log_scale += scale.ln(),
            None => return Ok(None),
        }
        factors.push(summed);
        eliminated += 1;
    }

    let mut joint = Factor::constant(1.0);
    for f in &factors {
        joint = joint.product(f).map_err(|r| EngineError::query(target, r))?;
    }
    match (joint.scope(), joint.values()) {
        ([v], &[a, p]) if *v == target_id => Ok(Some(Marginal {
            values: [a, p],
            log_scale,
            eliminated,
        })),
        _ => Err(EngineError::query(
            target,
            "elimination did not end with a factor over the target",
        )),
    }
}

/// Variable whose elimination produces the smallest factor; ties go to the
/// variable touching fewer factors, then to the lower identifier.
fn next_variable(pending: &BTreeSet<VariableId>, factors: &[Factor]) -> Option<VariableId> {
    pending
        .iter()
        .map(|&var| {
            let mut scope: BTreeSet<VariableId> = BTreeSet::new();
            let mut touching = 0usize;
            for f in factors.iter().filter(|f| f.mentions(var)) {
                touching += 1;
                scope.extend(f.scope().iter().copied());
            }
            ((scope.len(), touching, var), var)
        })
        .min_by_key(|(key, _)| *key)
        .map(|(_, var)| var)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::EngineConfig;
    use crate::engine::cpd::Cpt;
    use crate::engine::knowledge::KnowledgeBase;

    const TOL: f64 = 1e-9;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < TOL, "expected {} ≈ {}", a, b);
    }

    fn flu_cold() -> KnowledgeBase {
        let mut kb = KnowledgeBase::new();
        kb.add_disease_symptoms("Flu", ["Fever", "Cough", "Fatigue"]);
        kb.add_disease_symptoms("Cold", ["Fever", "Cough"]);
        kb.add_disease_symptoms("Allergy", ["Sneezing", "Cough"]);
        kb
    }

    /// Enumerates the full joint distribution.
    fn brute_force(model: &ProbabilisticModel, target: &str, evidence: &Evidence) -> f64 {
        let n = model.structure().variables().len();
        let target_id = model.id(target).unwrap();
        let (mut num, mut den) = (0.0, 0.0);
        for assignment in 0..(1usize << n) {
            let state = |id: VariableId| (assignment >> id.index()) & 1 == 1;
            if evidence
                .iter()
                .any(|(name, s)| state(model.id(name).unwrap()) != s)
            {
                continue;
            }
            let mut p = 1.0;
            for cpt in model.cpts() {
                let parents: Vec<bool> = cpt.parents().iter().map(|&q| state(q)).collect();
                p *= cpt.probability(state(cpt.variable()), &parents).unwrap();
            }
            den += p;
            if state(target_id) {
                num += p;
            }
        }
        num / den
    }

    #[test]
    fn single_edge_matches_bayes_rule() {
        let mut kb = KnowledgeBase::new();
        kb.add_disease_symptoms("Flu", ["Fever"]);
        let model = ProbabilisticModel::build(&kb, &EngineConfig::default()).unwrap();
        let ev = Evidence::new().with("Fever", true);
        let p = posterior(&model, "Flu", &ev).unwrap();
        let expected = 0.01 * 0.8575 / (0.01 * 0.8575 + 0.99 * 0.05);
        assert_close(p, expected);
    }

    #[test]
    fn no_evidence_returns_prior() {
        let model = ProbabilisticModel::build(&flu_cold(), &EngineConfig::default()).unwrap();
        assert_close(posterior(&model, "Cold", &Evidence::new()).unwrap(), 0.01);
    }

    #[test]
    fn elimination_matches_enumeration() {
        let model = ProbabilisticModel::build(&flu_cold(), &EngineConfig::default()).unwrap();
        let observed: BTreeSet<&str> = ["Fever", "Cough"].into_iter().collect();
        let ev = Evidence::complete(&model, &observed);
        for disease in ["Flu", "Cold", "Allergy"] {
            let p = posterior(&model, disease, &ev).unwrap();
            assert_close(p, brute_force(&model, disease, &ev));
        }
    }

    #[test]
    fn partial_evidence_matches_enumeration() {
        let model = ProbabilisticModel::build(&flu_cold(), &EngineConfig::default()).unwrap();
        let ev = Evidence::new().with("Cough", true).with("Sneezing", false);
        let p = posterior(&model, "Flu", &ev).unwrap();
        assert_close(p, brute_force(&model, "Flu", &ev));
    }

    #[test]
    fn closed_form_agrees_with_tabular() {
        let tabular = ProbabilisticModel::build(&flu_cold(), &EngineConfig::default()).unwrap();
        let closed = ProbabilisticModel::build(
            &flu_cold(),
            &EngineConfig {
                max_tabular_parents: 0,
                ..EngineConfig::default()
            },
        )
        .unwrap();
        let fever = closed.id("Fever").unwrap();
        assert!(closed.cpt(fever).unwrap().is_closed_form());

        let observed: BTreeSet<&str> = ["Cough"].into_iter().collect();
        let ev = Evidence::complete(&tabular, &observed);
        for disease in ["Flu", "Cold", "Allergy"] {
            assert_close(
                posterior(&closed, disease, &ev).unwrap(),
                posterior(&tabular, disease, &ev).unwrap(),
            );
        }
    }

    #[test]
    fn distribution_sums_to_one() {
        let model = ProbabilisticModel::build(&flu_cold(), &EngineConfig::default()).unwrap();
        let ev = Evidence::new().with("Fever", true);
        let [a, p] = posterior_distribution(&model, "Allergy", &ev).unwrap();
        assert_close(a + p, 1.0);
    }

    #[test]
    fn observing_target_fails_query() {
        let model = ProbabilisticModel::build(&flu_cold(), &EngineConfig::default()).unwrap();
        let ev = Evidence::new().with("Flu", true);
        let err = posterior(&model, "Flu", &ev).unwrap_err();
        assert!(matches!(err, EngineError::QueryFailure { ref variable, .. } if variable == "Flu"));
    }

    #[test]
    fn unknown_names_fail_query() {
        let model = ProbabilisticModel::build(&flu_cold(), &EngineConfig::default()).unwrap();
        assert!(posterior(&model, "Measles", &Evidence::new()).is_err());
        let ev = Evidence::new().with("Rash", true);
        assert!(posterior(&model, "Flu", &ev).is_err());
    }

    #[test]
    fn corrupted_table_fails_only_dependent_queries() {
        let mut kb = flu_cold();
        kb.add_disease_symptoms("Gout", ["Joint pain"]);
        let mut model = ProbabilisticModel::build(&kb, &EngineConfig::default()).unwrap();
        let gout = model.id("Gout").unwrap();
        model
            .override_cpt(Cpt::tabular(gout, std::iter::empty(), vec![0.99], vec![0.5]))
            .unwrap();

        let observed: BTreeSet<&str> = ["Fever"].into_iter().collect();
        let batch = diagnose(&model, &observed);
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].disease, "Gout");
        assert!(!batch.posteriors.contains_key("Gout"));
        assert_eq!(batch.posteriors.len(), 3);
    }

    #[test]
    fn corrupted_neighbour_prior_falls_back_to_configured_prior() {
        let clean = ProbabilisticModel::build(&flu_cold(), &EngineConfig::default()).unwrap();
        let mut model = clean.clone();
        let flu = model.id("Flu").unwrap();
        model
            .override_cpt(Cpt::tabular(flu, std::iter::empty(), vec![0.99], vec![0.5]))
            .unwrap();

        let observed: BTreeSet<&str> = ["Fever", "Cough"].into_iter().collect();
        let batch = diagnose(&model, &observed);
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].disease, "Flu");
        assert!(batch.failures[0].reason.contains("malformed"));

        let expected = diagnose(&clean, &observed);
        for disease in ["Cold", "Allergy"] {
            assert_close(batch.posteriors[disease], expected.posteriors[disease]);
        }
    }

    #[test]
    fn corrupted_symptom_table_fails_its_dependents() {
        let mut model = ProbabilisticModel::build(&flu_cold(), &EngineConfig::default()).unwrap();
        let fever = model.id("Fever").unwrap();
        let flu = model.id("Flu").unwrap();
        let cold = model.id("Cold").unwrap();
        model
            .override_cpt(Cpt::tabular(
                fever,
                [flu, cold],
                vec![0.9; 4],
                vec![0.9; 4],
            ))
            .unwrap();

        let ev = Evidence::new().with("Fever", true);
        let err = posterior(&model, "Cold", &ev).unwrap_err();
        assert!(matches!(err, EngineError::QueryFailure { ref reason, .. } if reason.contains("Fever")));
        // Allergy is not connected to Fever
        assert_close(posterior(&model, "Allergy", &ev).unwrap(), 0.01);
    }

    #[test]
    fn expanded_present_symptoms_match_enumeration() {
        let expanded = ProbabilisticModel::build(
            &flu_cold(),
            &EngineConfig {
                expand_present_parents: 1,
                ..EngineConfig::default()
            },
        )
        .unwrap();

        let observed: BTreeSet<&str> = ["Fever", "Cough"].into_iter().collect();
        let complete = Evidence::complete(&expanded, &observed);
        let partial = Evidence::new().with("Cough", true).with("Sneezing", false);
        for ev in [complete, partial] {
            for disease in ["Flu", "Cold", "Allergy"] {
                let p = posterior(&expanded, disease, &ev).unwrap();
                assert_close(p, brute_force(&expanded, disease, &ev));
            }
        }
    }

    #[test]
    fn common_present_symptom_stays_tractable() {
        // Fever has 30 parents; one factor over them would exceed the scope limit.
        let mut kb = KnowledgeBase::new();
        for i in 0..30 {
            kb.add_disease_symptoms(&format!("D{:02}", i), ["Fever"]);
        }
        let model = ProbabilisticModel::build(&kb, &EngineConfig::default()).unwrap();
        let observed: BTreeSet<&str> = ["Fever"].into_iter().collect();
        let batch = diagnose(&model, &observed);
        assert!(batch.failures.is_empty(), "{:?}", batch.failures);
        assert_eq!(batch.posteriors.len(), 30);

        let (prior, leak, q) = (0.01_f64, 0.05_f64, 0.85_f64);
        let others = (1.0 - prior * q).powi(29);
        let with = 1.0 - (1.0 - leak) * (1.0 - q) * others;
        let without = 1.0 - (1.0 - leak) * others;
        let expected = prior * with / (prior * with + (1.0 - prior) * without);
        for p in batch.posteriors.values() {
            assert_close(*p, expected);
        }
    }

    #[test]
    fn batch_reports_every_disease() {
        let model = ProbabilisticModel::build(&flu_cold(), &EngineConfig::default()).unwrap();
        let observed: BTreeSet<String> = ["Fever".to_string(), "Cough".to_string()].into();
        let batch = diagnose(&model, &observed);
        assert!(batch.failures.is_empty());
        assert_eq!(batch.posteriors.len(), 3);
        for p in batch.posteriors.values() {
            assert!((0.0..=1.0).contains(p));
        }
        assert!(batch.posteriors["Cold"] > 0.01);
    }
}
