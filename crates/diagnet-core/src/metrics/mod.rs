//! Knowledge statistics.
//!
//! Deterministic summaries of a [`KnowledgeBase`]: totals plus the diseases
//! with the most symptoms and the symptoms shared by the most diseases. Ties
//! are broken by name so that two runs over the same knowledge agree.

use crate::engine::knowledge::KnowledgeBase;

/// A name with a count, e.g. a disease and its number of symptoms.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RankedCount {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KnowledgeStats {
    pub disease_count: usize,
    pub symptom_count: usize,
    /// Number of (disease, symptom) relations.
    pub relationship_count: usize,
    /// Diseases by number of symptoms, descending.
    pub top_diseases: Vec<RankedCount>,
    /// Symptoms by number of parent diseases, descending.
    pub common_symptoms: Vec<RankedCount>,
}

impl KnowledgeStats {
    /// Computes totals and the top `top_n` entries of each ranking.
    pub fn compute(kb: &KnowledgeBase, top_n: usize) -> Self {
        let top_diseases = top(
            kb.iter()
                .map(|(disease, symptoms)| (disease.as_str(), symptoms.len())),
            top_n,
        );
        let common_symptoms = top(
            kb.parent_map()
                .into_iter()
                .map(|(symptom, parents)| (symptom, parents.len())),
            top_n,
        );

        Self {
            disease_count: kb.disease_count(),
            symptom_count: kb.symptom_count(),
            relationship_count: kb.edge_count(),
            top_diseases,
            common_symptoms,
        }
    }
}

fn top<'a>(counts: impl Iterator<Item = (&'a str, usize)>, n: usize) -> Vec<RankedCount> {
    let mut ranked: Vec<(&str, usize)> = counts.collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked
        .into_iter()
        .take(n)
        .map(|(name, count)| RankedCount {
            name: name.to_string(),
            count,
        })
        .collect()
}
