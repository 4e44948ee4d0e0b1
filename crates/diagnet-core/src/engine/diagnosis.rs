//! # Diagnosis Coordinator
//!
//! [`DiagnosisEngine`] owns the knowledge base and the published model.
//!
//! ## Concurrency
//!
//! - Knowledge mutations and rebuilds are serialized by one maintenance lock.
//! - The published model lives in an [`ArcSwapOption`]. A rebuild constructs
//!   and validates a complete [`ModelSnapshot`] while holding the lock, then
//!   publishes it with a single store. A failed rebuild publishes nothing.
//! - `diagnose` never takes the lock. It loads one snapshot and answers both
//!   views from it, so a concurrent rebuild cannot mix two models into one
//!   report.
//!
//! Mutations only reach inference after the next successful [`rebuild`].
//!
//! [`rebuild`]: DiagnosisEngine::rebuild

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arc_swap::ArcSwapOption;
use diagnet_frontend::{IngestReport, KnowledgeEntry, KnowledgeFeed};

use crate::engine::config::{validate_threshold, EngineConfig};
use crate::engine::errors::{EngineError, QueryFailure};
use crate::engine::inference;
use crate::engine::knowledge::KnowledgeBase;
use crate::engine::network::ProbabilisticModel;
use crate::engine::overlap::{matching_diseases, OverlapMatch};
use crate::engine::snapshot::ModelSnapshot;
use crate::metrics::KnowledgeStats;
use crate::storage::{materialize, GraphSink};

/// Posterior probability of one disease.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiseaseProbability {
    pub disease: String,
    pub probability: f64,
}

/// Both diagnosis views over the same evidence and the same model.
///
/// The coordinator does not fuse the two rankings.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiagnosisReport {
    /// Generation of the snapshot that answered the request
    pub generation: u64,
    /// By probability descending, then disease ascending
    pub probabilistic: Vec<DiseaseProbability>,
    pub graph_matches: Vec<OverlapMatch>,
    /// Diseases whose posterior could not be computed
    pub failures: Vec<QueryFailure>,
    /// Requested symptoms the model does not know; treated as absent evidence
    pub unknown_symptoms: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct Maintenance {
    knowledge: KnowledgeBase,
    generation: u64,
}

/// Knowledge maintenance plus atomically published inference.
pub struct DiagnosisEngine {
    config: EngineConfig,
    maintenance: Mutex<Maintenance>,
    published: ArcSwapOption<ModelSnapshot>,
}

impl std::fmt::Debug for DiagnosisEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosisEngine")
            .field("config", &self.config)
            .field("generation", &self.generation())
            .finish_non_exhaustive()
    }
}

impl DiagnosisEngine {
    /// Creates an engine with empty knowledge and no published model.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        Ok(Self {
            config: config.validate()?,
            maintenance: Mutex::new(Maintenance::default()),
            published: ArcSwapOption::empty(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, Maintenance> {
        // Every mutation below leaves the knowledge base consistent, so a
        // poisoned lock still guards valid data.
        self.maintenance
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies the accepted entries of a parsed feed (last write wins) and
    /// logs the lines the parser dropped. Returns the feed's report.
    pub fn ingest(&self, feed: &KnowledgeFeed) -> IngestReport {
        self.ingest_entries(&feed.entries);
        let report = &feed.report;
        for skipped in &report.examples {
            tracing::warn!(
                "skipped knowledge line {}: {} ({:?})",
                skipped.position,
                skipped.error,
                skipped.text
            );
        }
        if report.skipped > report.examples.len() {
            tracing::warn!(
                "{} further knowledge lines skipped",
                report.skipped - report.examples.len()
            );
        }
        report.clone()
    }

    pub fn ingest_entries<'a, I>(&self, entries: I)
    where
        I: IntoIterator<Item = &'a KnowledgeEntry>,
    {
        self.lock().knowledge.ingest(entries);
    }

    pub fn add_disease_symptoms<I, S>(&self, disease: &str, symptoms: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.lock().knowledge.add_disease_symptoms(disease, symptoms);
    }

    pub fn set_disease_symptoms<I, S>(&self, disease: &str, symptoms: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.lock().knowledge.set_disease_symptoms(disease, symptoms);
    }

    pub fn update_disease_symptoms<I, S>(&self, disease: &str, symptoms: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.lock()
            .knowledge
            .update_disease_symptoms(disease, symptoms)
    }

    pub fn remove_disease(&self, disease: &str) -> bool {
        self.lock().knowledge.remove_disease(disease)
    }

    /// Copy of the current (possibly unpublished) knowledge.
    pub fn knowledge(&self) -> KnowledgeBase {
        self.lock().knowledge.clone()
    }

    pub fn symptoms_of(&self, disease: &str) -> Option<BTreeSet<String>> {
        self.lock().knowledge.symptoms_of(disease)
    }

    pub fn all_diseases(&self) -> BTreeSet<String> {
        self.lock().knowledge.all_diseases()
    }

    pub fn all_symptoms(&self) -> BTreeSet<String> {
        self.lock().knowledge.all_symptoms()
    }

    pub fn stats(&self, top_n: usize) -> KnowledgeStats {
        KnowledgeStats::compute(&self.lock().knowledge, top_n)
    }

    /// Streams the current knowledge into `sink`.
    pub fn materialize<G: GraphSink + ?Sized>(&self, sink: &mut G) -> Result<(), G::Error> {
        let knowledge = self.knowledge();
        materialize(&knowledge, sink)
    }

    /// Builds, validates, and publishes a model of the current knowledge.
    ///
    /// On failure the previously published snapshot stays in service and the
    /// generation does not advance.
    pub fn rebuild(&self) -> Result<Arc<ModelSnapshot>, EngineError> {
        let mut state = self.lock();
        let model = match ProbabilisticModel::build(&state.knowledge, &self.config) {
            Ok(model) => model,
            Err(err) => {
                tracing::warn!("model rebuild rejected: {}", err);
                return Err(err);
            }
        };

        state.generation += 1;
        let snapshot = Arc::new(ModelSnapshot::new(model, state.generation));
        self.published.store(Some(Arc::clone(&snapshot)));

        let meta = snapshot.metadata();
        tracing::info!(
            "published model generation {} ({} diseases, {} symptoms, {} tables)",
            meta.generation,
            meta.disease_count,
            meta.symptom_count,
            meta.cpt_count
        );
        Ok(snapshot)
    }

    /// The published snapshot, or a configuration error before the first
    /// successful rebuild.
    pub fn snapshot(&self) -> Result<Arc<ModelSnapshot>, EngineError> {
        self.published.load_full().ok_or_else(|| {
            EngineError::Configuration("no model has been built; call rebuild() first".into())
        })
    }

    pub fn generation(&self) -> Option<u64> {
        self.published.load().as_ref().map(|s| s.generation())
    }

    /// Diagnoses with the configured overlap threshold.
    pub fn diagnose<S: AsRef<str> + Ord>(
        &self,
        symptoms: &BTreeSet<S>,
    ) -> Result<DiagnosisReport, EngineError> {
        self.diagnose_with_threshold(symptoms, self.config.match_threshold)
    }

    /// Runs exact inference and overlap ranking against one snapshot.
    ///
    /// Per-disease inference failures are reported in
    /// [`DiagnosisReport::failures`]. Only a missing model or an unusable
    /// threshold fails the whole call.
    pub fn diagnose_with_threshold<S: AsRef<str> + Ord>(
        &self,
        symptoms: &BTreeSet<S>,
        threshold: f64,
    ) -> Result<DiagnosisReport, EngineError> {
        let threshold = validate_threshold(threshold)?;
        let snapshot = self.snapshot()?;
        let model = snapshot.model();

        let batch = inference::diagnose(model, symptoms);
        let graph_matches = matching_diseases(model.knowledge(), symptoms, threshold)?;

        let known = model.symptom_names();
        let unknown_symptoms: BTreeSet<String> = symptoms
            .iter()
            .map(|s| s.as_ref())
            .filter(|s| !known.contains(s))
            .map(str::to_string)
            .collect();

        let mut probabilistic: Vec<DiseaseProbability> = batch
            .posteriors
            .into_iter()
            .map(|(disease, probability)| DiseaseProbability {
                disease,
                probability,
            })
            .collect();
        probabilistic.sort_by(|a, b| {
            b.probability
                .total_cmp(&a.probability)
                .then_with(|| a.disease.cmp(&b.disease))
        });

        Ok(DiagnosisReport {
            generation: snapshot.generation(),
            probabilistic,
            graph_matches,
            failures: batch.failures,
            unknown_symptoms,
        })
    }
}
