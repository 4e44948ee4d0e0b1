//! Symptom-overlap ranking.
//!
//! A disease scores `|observed ∩ symptoms(d)| / |symptoms(d)|`, the share of
//! its own symptoms that were observed. Diseases with no symptoms never match.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::engine::config::validate_threshold;
use crate::engine::errors::EngineError;
use crate::engine::knowledge::KnowledgeBase;

/// One disease that met the overlap threshold.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OverlapMatch {
    pub disease: String,
    pub matched_symptoms: BTreeSet<String>,
    pub score: f64,
}

/// Diseases whose overlap score is at least `threshold`, by score descending
/// and then by disease name.
///
/// The comparison is inclusive: a score exactly equal to the threshold passes.
/// Fails with [`EngineError::Configuration`] when `threshold` is outside
/// `[0, 1]`.
pub fn matching_diseases<S: AsRef<str> + Ord>(
    kb: &KnowledgeBase,
    observed: &BTreeSet<S>,
    threshold: f64,
) -> Result<Vec<OverlapMatch>, EngineError> {
    let threshold = validate_threshold(threshold)?;
    let observed: BTreeSet<&str> = observed.iter().map(|s| s.as_ref()).collect();

    let mut matches: Vec<OverlapMatch> = kb
        .iter()
        .filter(|(_, symptoms)| !symptoms.is_empty())
        .filter_map(|(disease, symptoms)| {
            let matched: BTreeSet<String> = symptoms
                .iter()
                .filter(|s| observed.contains(s.as_str()))
                .cloned()
                .collect();
            let score = matched.len() as f64 / symptoms.len() as f64;
            (score >= threshold).then(|| OverlapMatch {
                disease: disease.clone(),
                matched_symptoms: matched,
                score,
            })
        })
        .collect();

    matches.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.disease.cmp(&b.disease))
    });
    Ok(matches)
}
