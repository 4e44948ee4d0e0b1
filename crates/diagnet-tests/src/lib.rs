//! Shared fixtures for the diagnet integration tests.

use diagnet_core::{Evidence, KnowledgeBase, ProbabilisticModel, VariableId};

/// The knowledge file used across scenario tests.
pub const FLU_COLD: &str = "\
# seasonal illnesses
Flu has symptoms Fever, Cough, Fatigue.
Cold has symptoms Fever, Cough.
";

pub fn flu_cold() -> KnowledgeBase {
    diagnet_core::load_knowledge(FLU_COLD).0
}

pub fn assert_close(actual: f64, expected: f64, tol: f64, label: &str) {
    assert!(
        (actual - expected).abs() <= tol,
        "{} mismatch: expected {:.15}, got {:.15}, diff={:.3e}",
        label,
        expected,
        actual,
        (actual - expected).abs()
    );
}

/// P(target present | evidence) by enumerating the full joint distribution.
///
/// Only usable for small networks; panics on names the model does not know.
pub fn enumerate_posterior(model: &ProbabilisticModel, target: &str, evidence: &Evidence) -> f64 {
    let n = model.structure().variables().len();
    assert!(n <= 20, "enumeration over {} variables is too large", n);
    let target_id = model.id(target).expect("unknown target");
    let fixed: Vec<(VariableId, bool)> = evidence
        .iter()
        .map(|(name, s)| (model.id(name).expect("unknown evidence variable"), s))
        .collect();

    let (mut num, mut den) = (0.0, 0.0);
    for assignment in 0..(1usize << n) {
        let state = |id: VariableId| (assignment >> id.0) & 1 == 1;
        if fixed.iter().any(|&(id, s)| state(id) != s) {
            continue;
        }
        let mut p = 1.0;
        for cpt in model.cpts() {
            let parents: Vec<bool> = cpt.parents().iter().map(|&q| state(q)).collect();
            p *= cpt
                .probability(state(cpt.variable()), &parents)
                .expect("well-formed table");
        }
        den += p;
        if state(target_id) {
            num += p;
        }
    }
    num / den
}
