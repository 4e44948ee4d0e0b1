//! Published model snapshots.
//!
//! A snapshot pairs an immutable [`ProbabilisticModel`] with the generation it
//! was published under. Readers hold an `Arc<ModelSnapshot>` for the length of
//! one request, so a concurrent rebuild never changes the model under them.

use crate::engine::network::ProbabilisticModel;

/// Version of the engine that built a snapshot.
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Descriptive data recorded when a snapshot is published.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SnapshotMetadata {
    /// Strictly increasing across successful rebuilds of one engine.
    pub generation: u64,
    pub engine_version: String,
    pub disease_count: usize,
    pub symptom_count: usize,
    pub cpt_count: usize,
    /// Symptom tables kept in closed noisy-OR form.
    pub closed_form_cpts: usize,
}

#[derive(Debug, Clone)]
pub struct ModelSnapshot {
    model: ProbabilisticModel,
    metadata: SnapshotMetadata,
}

impl ModelSnapshot {
    pub fn new(model: ProbabilisticModel, generation: u64) -> Self {
        let metadata = SnapshotMetadata {
            generation,
            engine_version: ENGINE_VERSION.to_string(),
            disease_count: model.disease_count(),
            symptom_count: model.symptom_count(),
            cpt_count: model.cpts().len(),
            closed_form_cpts: model.cpts().iter().filter(|c| c.is_closed_form()).count(),
        };
        Self { model, metadata }
    }

    pub fn model(&self) -> &ProbabilisticModel {
        &self.model
    }

    pub fn metadata(&self) -> &SnapshotMetadata {
        &self.metadata
    }

    pub fn generation(&self) -> u64 {
        self.metadata.generation
    }
}
