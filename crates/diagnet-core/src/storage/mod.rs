//! Graph materialization hook.
//!
//! The engine keeps no storage dependency. A collaborator that wants to
//! persist the knowledge graph implements [`GraphSink`] and hands it to
//! [`materialize`], which emits:
//!
//! - one `Disease` node per disease,
//! - one `Symptom` node per symptom,
//! - one `HAS_SYMPTOM` relation per (disease, symptom) pair,
//!
//! in that order, each group sorted by identifier. Inference never depends on
//! a sink being present.

use std::convert::Infallible;

use crate::engine::knowledge::KnowledgeBase;

/// Relation type linking a disease to a symptom it causes.
pub const HAS_SYMPTOM: &str = "HAS_SYMPTOM";

/// Receiver of materialized graph elements.
pub trait GraphSink {
    type Error;

    fn record_disease(&mut self, disease: &str) -> Result<(), Self::Error>;
    fn record_symptom(&mut self, symptom: &str) -> Result<(), Self::Error>;
    fn record_has_symptom(&mut self, disease: &str, symptom: &str) -> Result<(), Self::Error>;
}

/// Streams `kb` into `sink`. Stops at the first sink error.
pub fn materialize<G: GraphSink + ?Sized>(kb: &KnowledgeBase, sink: &mut G) -> Result<(), G::Error> {
    for (disease, _) in kb.iter() {
        sink.record_disease(disease)?;
    }
    for symptom in kb.all_symptoms() {
        sink.record_symptom(&symptom)?;
    }
    for (disease, symptom) in kb.edges() {
        sink.record_has_symptom(disease, symptom)?;
    }
    Ok(())
}

/// Node label in a [`MaterializedGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NodeLabel {
    Disease,
    Symptom,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GraphNode {
    pub label: NodeLabel,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GraphRelation {
    pub kind: String,
    pub from: String,
    pub to: String,
}

/// In-memory sink holding everything it was sent, in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MaterializedGraph {
    pub nodes: Vec<GraphNode>,
    pub relations: Vec<GraphRelation>,
}

impl MaterializedGraph {
    pub fn from_knowledge(kb: &KnowledgeBase) -> Self {
        let mut graph = Self::default();
        match materialize(kb, &mut graph) {
            Ok(()) => graph,
            Err(never) => match never {},
        }
    }

    pub fn nodes_with_label(&self, label: NodeLabel) -> impl Iterator<Item = &GraphNode> + '_ {
        self.nodes.iter().filter(move |n| n.label == label)
    }
}

impl GraphSink for MaterializedGraph {
    type Error = Infallible;

    fn record_disease(&mut self, disease: &str) -> Result<(), Infallible> {
        self.nodes.push(GraphNode {
            label: NodeLabel::Disease,
            name: disease.to_string(),
        });
        Ok(())
    }

    fn record_symptom(&mut self, symptom: &str) -> Result<(), Infallible> {
        self.nodes.push(GraphNode {
            label: NodeLabel::Symptom,
            name: symptom.to_string(),
        });
        Ok(())
    }

    fn record_has_symptom(&mut self, disease: &str, symptom: &str) -> Result<(), Infallible> {
        self.relations.push(GraphRelation {
            kind: HAS_SYMPTOM.to_string(),
            from: disease.to_string(),
            to: symptom.to_string(),
        });
        Ok(())
    }
}
