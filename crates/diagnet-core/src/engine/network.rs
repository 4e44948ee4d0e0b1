//! # Probabilistic Model
//!
//! Two-layer causal network: disease variables are roots, symptom variables
//! are their children. Construction is all-or-nothing:
//!
//! 1. [`NetworkStructure::from_knowledge`] registers variables and edges.
//! 2. [`crate::engine::cpd::synthesize_cpts`] produces the tables.
//! 3. [`crate::engine::validate::validate_network`] checks the draft.
//! 4. Only then is a [`ProbabilisticModel`] assembled.
//!
//! A built model is never mutated by the engine. Rebuilding produces a new
//! model from the current knowledge.

use std::collections::BTreeSet;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::engine::config::EngineConfig;
use crate::engine::cpd::{synthesize_cpts, Cpt};
use crate::engine::errors::EngineError;
use crate::engine::knowledge::KnowledgeBase;
use crate::engine::validate::validate_network;

/// Identifier of a network variable.
///
/// Factor scopes are sorted by id, so the ordering fixes which bit of an
/// assignment index belongs to which variable.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct VariableId(pub u32);

impl VariableId {
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Role a variable was first registered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableRole {
    Disease,
    Symptom,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub id: VariableId,
    /// Using Arc<str> for cheap cloning into factors and results
    pub name: Arc<str>,
    pub role: VariableRole,
}

/// Variables and causal edges, before any table is attached.
#[derive(Debug, Clone, Default)]
pub struct NetworkStructure {
    variables: Vec<Variable>,
    index: FxHashMap<Arc<str>, VariableId>,
    edges: Vec<(VariableId, VariableId)>,
    parents: Vec<SmallVec<[VariableId; 4]>>,
    children: Vec<SmallVec<[VariableId; 4]>>,
    diseases: Vec<VariableId>,
    symptoms: Vec<VariableId>,
}

impl NetworkStructure {
    /// Registers every disease, then every symptom, then every causal edge.
    ///
    /// Variables are keyed by name. A symptom whose name is already a disease
    /// reuses that variable and is listed in both role lists, which the
    /// validator reports as a structural error.
    pub fn from_knowledge(kb: &KnowledgeBase) -> Self {
        let mut s = Self::default();
        for (disease, _) in kb.iter() {
            let id = s.register(disease, VariableRole::Disease);
            s.diseases.push(id);
        }
        for symptom in kb.all_symptoms() {
            let id = s.register(&symptom, VariableRole::Symptom);
            s.symptoms.push(id);
        }
        for (disease, symptom) in kb.edges() {
            let (Some(src), Some(dst)) = (s.id(disease), s.id(symptom)) else {
                continue;
            };
            s.add_edge(src, dst);
        }
        s
    }

    fn register(&mut self, name: &str, role: VariableRole) -> VariableId {
        if let Some(&id) = self.index.get(name) {
            return id;
        }
        let id = VariableId(self.variables.len() as u32);
        let name: Arc<str> = Arc::from(name);
        self.index.insert(name.clone(), id);
        self.variables.push(Variable { id, name, role });
        self.parents.push(SmallVec::new());
        self.children.push(SmallVec::new());
        id
    }

    pub(crate) fn add_edge(&mut self, src: VariableId, dst: VariableId) {
        self.edges.push((src, dst));
        self.parents[dst.index()].push(src);
        self.children[src.index()].push(dst);
    }

    pub fn id(&self, name: &str) -> Option<VariableId> {
        self.index.get(name).copied()
    }

    pub fn variable(&self, id: VariableId) -> Option<&Variable> {
        self.variables.get(id.index())
    }

    pub fn name(&self, id: VariableId) -> &str {
        self.variables
            .get(id.index())
            .map(|v| v.name.as_ref())
            .unwrap_or("<unknown>")
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn edges(&self) -> &[(VariableId, VariableId)] {
        &self.edges
    }

    /// Parents of `id` in edge order (disease identifier order).
    pub fn parents_of(&self, id: VariableId) -> &[VariableId] {
        self.parents.get(id.index()).map_or(&[], |p| p.as_slice())
    }

    pub fn children_of(&self, id: VariableId) -> &[VariableId] {
        self.children.get(id.index()).map_or(&[], |c| c.as_slice())
    }

    /// Variables declared as diseases (roots).
    pub fn diseases(&self) -> &[VariableId] {
        &self.diseases
    }

    /// Variables declared as symptoms (derived).
    pub fn symptoms(&self) -> &[VariableId] {
        &self.symptoms
    }
}

/// Structure plus tables, before validation.
#[derive(Debug, Clone)]
pub struct NetworkDraft {
    pub structure: NetworkStructure,
    pub cpts: Vec<Cpt>,
}

impl NetworkDraft {
    pub fn synthesize(kb: &KnowledgeBase, config: &EngineConfig) -> Self {
        let structure = NetworkStructure::from_knowledge(kb);
        let cpts = synthesize_cpts(&structure, config);
        Self { structure, cpts }
    }
}

/// A validated network ready for inference.
#[derive(Debug, Clone)]
pub struct ProbabilisticModel {
    structure: NetworkStructure,
    /// One table per variable, indexed by `VariableId`
    cpts: Vec<Cpt>,
    knowledge: KnowledgeBase,
    config: EngineConfig,
}

impl ProbabilisticModel {
    /// Synthesizes, validates, and assembles a model from `kb`.
    pub fn build(kb: &KnowledgeBase, config: &EngineConfig) -> Result<Self, EngineError> {
        let config = config.validate()?;
        let draft = NetworkDraft::synthesize(kb, &config);
        Self::from_draft(draft, kb.clone(), config)
    }

    /// Validates `draft` and assembles it. Nothing is kept on failure.
    pub fn from_draft(
        draft: NetworkDraft,
        knowledge: KnowledgeBase,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        validate_network(&draft, &config)?;

        let NetworkDraft { structure, cpts } = draft;
        let mut slots: Vec<Option<Cpt>> = vec![None; structure.variables.len()];
        for cpt in cpts {
            let idx = cpt.variable().index();
            slots[idx] = Some(cpt);
        }
        let cpts = slots
            .into_iter()
            .enumerate()
            .map(|(idx, cpt)| {
                cpt.ok_or_else(|| {
                    EngineError::Internal(format!(
                        "validated draft lacks a table for '{}'",
                        structure.name(VariableId(idx as u32))
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            structure,
            cpts,
            knowledge,
            config,
        })
    }

    pub fn structure(&self) -> &NetworkStructure {
        &self.structure
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cpt(&self, id: VariableId) -> Option<&Cpt> {
        self.cpts.get(id.index())
    }

    pub fn cpts(&self) -> &[Cpt] {
        &self.cpts
    }

    pub fn id(&self, name: &str) -> Option<VariableId> {
        self.structure.id(name)
    }

    pub fn name(&self, id: VariableId) -> &str {
        self.structure.name(id)
    }

    pub fn disease_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.structure
            .diseases()
            .iter()
            .map(move |&id| self.structure.name(id))
    }

    pub fn symptom_names(&self) -> BTreeSet<&str> {
        self.structure
            .symptoms()
            .iter()
            .map(|&id| self.structure.name(id))
            .collect()
    }

    pub fn disease_count(&self) -> usize {
        self.structure.diseases().len()
    }

    pub fn symptom_count(&self) -> usize {
        self.structure.symptoms().len()
    }

    /// Replaces the table of `cpt.variable()` without validation.
    ///
    /// Used to inject faults; queries that touch a malformed table fail with
    /// [`EngineError::QueryFailure`].
    pub fn override_cpt(&mut self, cpt: Cpt) -> Result<(), EngineError> {
        let slot = self.cpts.get_mut(cpt.variable().index()).ok_or_else(|| {
            EngineError::Structural(format!(
                "table references unknown variable {:?}",
                cpt.variable()
            ))
        })?;
        *slot = cpt;
        Ok(())
    }
}
