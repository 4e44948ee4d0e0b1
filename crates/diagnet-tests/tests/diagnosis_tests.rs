//! End-to-end tests for the diagnosis coordinator.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

use diagnet_core::{
    DiagnosisEngine, EngineConfig, EngineError, MaterializedGraph, ModelSnapshot,
};
use diagnet_frontend::parse_knowledge;
use diagnet_tests::{assert_close, FLU_COLD};

fn symptoms(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn flu_cold_engine() -> DiagnosisEngine {
    let engine = DiagnosisEngine::new(EngineConfig::default()).unwrap();
    let report = engine.ingest(&parse_knowledge(FLU_COLD));
    assert!(report.is_clean());
    engine.rebuild().unwrap();
    engine
}

#[test]
fn flu_cold_scenario() {
    let engine = flu_cold_engine();
    let report = engine.diagnose(&symptoms(&["Fever", "Cough"])).unwrap();

    let matches: Vec<(&str, f64)> = report
        .graph_matches
        .iter()
        .map(|m| (m.disease.as_str(), m.score))
        .collect();
    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0], ("Cold", 1.0));
    assert_eq!(matches[1].0, "Flu");
    assert_close(matches[1].1, 2.0 / 3.0, 1e-12, "Flu overlap");

    assert_eq!(report.probabilistic.len(), 2);
    assert_eq!(report.probabilistic[0].disease, "Cold");
    for p in &report.probabilistic {
        assert!(p.probability > 0.01, "{} stayed at its prior", p.disease);
        assert!(p.probability <= 1.0);
    }
    assert!(report.failures.is_empty());
    assert!(report.unknown_symptoms.is_empty());
}

#[test]
fn threshold_boundary_is_inclusive() {
    let engine = DiagnosisEngine::new(EngineConfig::default()).unwrap();
    engine.add_disease_symptoms("Migraine", ["Headache", "Nausea"]);
    engine.rebuild().unwrap();

    let obs = symptoms(&["Headache"]);
    let at = engine.diagnose_with_threshold(&obs, 0.5).unwrap();
    assert_eq!(at.graph_matches.len(), 1);
    assert_eq!(at.graph_matches[0].score, 0.5);

    let above = engine.diagnose_with_threshold(&obs, 0.51).unwrap();
    assert!(above.graph_matches.is_empty());
    // the probabilistic view is unaffected by the overlap threshold
    assert_eq!(above.probabilistic, at.probabilistic);
}

#[test]
fn ties_are_ordered_by_disease_name() {
    let engine = DiagnosisEngine::new(EngineConfig::default()).unwrap();
    engine.add_disease_symptoms("Zeta", ["Rash"]);
    engine.add_disease_symptoms("Alpha", ["Rash"]);
    engine.add_disease_symptoms("Mu", ["Rash"]);
    engine.rebuild().unwrap();

    // Rash absent: every disease is its own component with identical factors
    let report = engine
        .diagnose_with_threshold(&symptoms(&["Itch"]), 0.0)
        .unwrap();
    let prob: Vec<&str> = report
        .probabilistic
        .iter()
        .map(|p| p.disease.as_str())
        .collect();
    let overlap: Vec<&str> = report
        .graph_matches
        .iter()
        .map(|m| m.disease.as_str())
        .collect();
    assert_eq!(prob, vec!["Alpha", "Mu", "Zeta"]);
    assert_eq!(overlap, vec!["Alpha", "Mu", "Zeta"]);
    assert!(report.graph_matches.iter().all(|m| m.score == 0.0));
}

#[test]
fn unknown_symptoms_are_absent_evidence() {
    let engine = flu_cold_engine();
    let with_unknown = engine
        .diagnose(&symptoms(&["Fever", "Cough", "Purple spots"]))
        .unwrap();
    let without = engine.diagnose(&symptoms(&["Fever", "Cough"])).unwrap();
    assert_eq!(with_unknown.unknown_symptoms, symptoms(&["Purple spots"]));
    assert_eq!(with_unknown.probabilistic, without.probabilistic);
    assert_eq!(with_unknown.graph_matches, without.graph_matches);
}

#[test]
fn not_ready_is_distinct_from_empty_result() {
    let engine = DiagnosisEngine::new(EngineConfig::default()).unwrap();
    assert!(matches!(
        engine.diagnose(&symptoms(&["Fever"])),
        Err(EngineError::Configuration(_))
    ));
    assert!(engine.snapshot().is_err());

    engine.rebuild().unwrap();
    let report = engine.diagnose(&symptoms(&["Fever"])).unwrap();
    assert!(report.probabilistic.is_empty());
    assert!(report.graph_matches.is_empty());
}

#[test]
fn rebuild_is_idempotent() {
    let engine = flu_cold_engine();
    let obs = symptoms(&["Fever"]);
    let first = engine.diagnose(&obs).unwrap();
    engine.rebuild().unwrap();
    let second = engine.diagnose(&obs).unwrap();

    assert_eq!(second.generation, first.generation + 1);
    assert_eq!(first.probabilistic, second.probabilistic);
    assert_eq!(first.graph_matches, second.graph_matches);
}

#[test]
fn removal_drops_orphaned_symptoms_after_rebuild() {
    let engine = flu_cold_engine();
    assert!(engine.remove_disease("Flu"));
    assert!(!engine.all_symptoms().contains("Fatigue"));

    let stale = engine.diagnose(&symptoms(&["Fatigue"])).unwrap();
    assert!(stale.unknown_symptoms.is_empty());

    engine.rebuild().unwrap();
    let fresh = engine.diagnose(&symptoms(&["Fatigue"])).unwrap();
    assert_eq!(fresh.unknown_symptoms, symptoms(&["Fatigue"]));
    assert_eq!(fresh.probabilistic.len(), 1);
}

#[test]
fn update_only_touches_known_diseases() {
    let engine = flu_cold_engine();
    assert!(!engine.update_disease_symptoms("Measles", ["Rash"]));
    assert!(engine.update_disease_symptoms("Cold", ["Sneezing"]));
    assert_eq!(engine.symptoms_of("Cold"), Some(symptoms(&["Sneezing"])));
    assert_eq!(engine.all_diseases(), symptoms(&["Cold", "Flu"]));
}

#[test]
fn snapshot_metadata_tracks_generation() {
    let engine = flu_cold_engine();
    let snap: Arc<ModelSnapshot> = engine.snapshot().unwrap();
    assert_eq!(snap.generation(), 1);
    assert_eq!(snap.metadata().disease_count, 2);
    assert_eq!(snap.metadata().symptom_count, 3);

    engine.add_disease_symptoms("Measles", ["Rash"]);
    engine.rebuild().unwrap();
    assert_eq!(engine.generation(), Some(2));
    // a snapshot held by a reader is unaffected by the rebuild
    assert_eq!(snap.model().disease_count(), 2);
}

#[test]
fn materialization_reflects_current_knowledge() {
    let engine = flu_cold_engine();
    let mut graph = MaterializedGraph::default();
    engine.materialize(&mut graph).unwrap();
    assert_eq!(graph.nodes.len(), 5);
    assert_eq!(graph.relations.len(), 5);
}

#[test]
fn report_serializes_to_json() {
    let engine = flu_cold_engine();
    let report = engine.diagnose(&symptoms(&["Fever"])).unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["generation"], 1);
    assert!(json["probabilistic"].is_array());
    assert!(json["graph_matches"].as_array().unwrap().len() >= 1);
}

#[test]
fn common_symptom_keeps_probabilistic_view() {
    let engine = DiagnosisEngine::new(EngineConfig::default()).unwrap();
    for i in 0..30 {
        engine.add_disease_symptoms(&format!("D{:02}", i), ["Fever", format!("S{:02}", i).as_str()]);
    }
    engine.rebuild().unwrap();

    let report = engine.diagnose(&symptoms(&["Fever", "S04"])).unwrap();
    assert!(report.failures.is_empty(), "{:?}", report.failures);
    assert_eq!(report.probabilistic.len(), 30);
    assert_eq!(report.probabilistic[0].disease, "D04");
    assert_eq!(report.graph_matches[0].disease, "D04");
}

#[test]
fn readers_never_see_a_mixed_model() {
    let engine = Arc::new(DiagnosisEngine::new(EngineConfig::default()).unwrap());
    engine.add_disease_symptoms("D00", ["S00"]);
    engine.rebuild().unwrap();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                let obs = symptoms(&["Fever"]);
                for _ in 0..50 {
                    let report = engine.diagnose_with_threshold(&obs, 0.0).unwrap();
                    // generation g holds exactly g diseases
                    let answered = report.probabilistic.len() + report.failures.len();
                    assert_eq!(answered as u64, report.generation);
                    assert_eq!(report.graph_matches.len() as u64, report.generation);
                }
            })
        })
        .collect();

    for i in 1..20 {
        engine.add_disease_symptoms(&format!("D{:02}", i), [format!("S{:02}", i)]);
        engine.rebuild().unwrap();
    }
    for r in readers {
        r.join().unwrap();
    }
    assert_eq!(engine.generation(), Some(20));
}
