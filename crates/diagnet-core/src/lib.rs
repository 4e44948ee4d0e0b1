//! # Diagnet Core
//!
//! Disease/symptom diagnosis over a two-layer noisy-OR causal network.
//!
//! Knowledge is kept in a [`KnowledgeBase`], compiled into a validated
//! [`ProbabilisticModel`], and published by a [`DiagnosisEngine`] that answers
//! every request with two independent views: exact posteriors and a
//! symptom-overlap ranking.
//!
//! ```
//! use std::collections::BTreeSet;
//! use diagnet_core::{DiagnosisEngine, EngineConfig};
//!
//! let engine = DiagnosisEngine::new(EngineConfig::default()).unwrap();
//! engine.add_disease_symptoms("Flu", ["Fever", "Cough", "Fatigue"]);
//! engine.add_disease_symptoms("Cold", ["Fever", "Cough"]);
//! engine.rebuild().unwrap();
//!
//! let observed: BTreeSet<&str> = ["Fever", "Cough"].into_iter().collect();
//! let report = engine.diagnose(&observed).unwrap();
//! assert_eq!(report.graph_matches[0].disease, "Cold");
//! ```

#![forbid(unsafe_code)]

pub mod engine;
pub mod metrics;
pub mod storage;

// Re-export commonly used types
pub use engine::config::EngineConfig;
pub use engine::cpd::{Cpt, CptValues, NoisyOrParams};
pub use engine::diagnosis::{DiagnosisEngine, DiagnosisReport, DiseaseProbability};
pub use engine::errors::{EngineError, QueryFailure};
pub use engine::inference::{posterior, posterior_distribution, Evidence, PosteriorBatch};
pub use engine::knowledge::KnowledgeBase;
pub use engine::network::{ProbabilisticModel, VariableId};
pub use engine::overlap::{matching_diseases, OverlapMatch};
pub use engine::snapshot::{ModelSnapshot, SnapshotMetadata};
pub use metrics::KnowledgeStats;
pub use storage::{materialize, GraphSink, MaterializedGraph};

/// Parses a knowledge feed and returns the resulting knowledge base together
/// with the ingestion report.
pub fn load_knowledge(source: &str) -> (KnowledgeBase, diagnet_frontend::IngestReport) {
    let feed = diagnet_frontend::parse_knowledge(source);
    (KnowledgeBase::from_entries(&feed.entries), feed.report)
}
