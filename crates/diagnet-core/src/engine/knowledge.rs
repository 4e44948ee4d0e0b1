//! # Knowledge Model
//!
//! In-memory disease → symptom relation.
//!
//! Symptoms are derived entities: a symptom exists only while at least one
//! disease lists it, so removing the last disease that references a symptom
//! drops that symptom as well. Diseases are sources and symptoms are sinks of
//! the causal relation; nothing here can declare a symptom as a cause.
//!
//! All storage is ordered (`BTreeMap` / `BTreeSet`) so that every accessor,
//! every synthesized table, and every ranking iterates in a stable order.
//! Accessors return owned snapshots rather than views into internal storage.

use std::collections::{BTreeMap, BTreeSet};

use diagnet_frontend::KnowledgeEntry;

/// Diseases keyed by identifier, each with the set of symptoms it causes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnowledgeBase {
    diseases: BTreeMap<String, BTreeSet<String>>,
}

impl KnowledgeBase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a knowledge base from feed entries, later entries replacing
    /// earlier ones for the same disease.
    pub fn from_entries<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = &'a KnowledgeEntry>,
    {
        let mut kb = Self::new();
        kb.ingest(entries);
        kb
    }

    /// Applies feed entries in order with replace semantics (last write wins).
    pub fn ingest<'a, I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = &'a KnowledgeEntry>,
    {
        for entry in entries {
            self.set_disease_symptoms(&entry.disease, entry.symptoms.iter());
        }
    }

    /// Unions `symptoms` into the disease's symptom set, registering the
    /// disease if needed. Repeating a call has no further effect.
    pub fn add_disease_symptoms<I, S>(&mut self, disease: &str, symptoms: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set = self.diseases.entry(disease.to_string()).or_default();
        set.extend(symptoms.into_iter().map(|s| s.as_ref().to_string()));
    }

    /// Replaces the disease's symptom set, registering the disease if needed.
    pub fn set_disease_symptoms<I, S>(&mut self, disease: &str, symptoms: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set: BTreeSet<String> = symptoms
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect();
        self.diseases.insert(disease.to_string(), set);
    }

    /// Replaces the symptom set of an existing disease. Returns `false` and
    /// changes nothing when the disease is unknown.
    pub fn update_disease_symptoms<I, S>(&mut self, disease: &str, symptoms: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if !self.diseases.contains_key(disease) {
            return false;
        }
        self.set_disease_symptoms(disease, symptoms);
        true
    }

    /// Removes a disease. Symptoms no other disease references disappear with
    /// it. Returns whether the disease existed.
    pub fn remove_disease(&mut self, disease: &str) -> bool {
        self.diseases.remove(disease).is_some()
    }

    pub fn contains_disease(&self, disease: &str) -> bool {
        self.diseases.contains_key(disease)
    }

    pub fn contains_symptom(&self, symptom: &str) -> bool {
        self.diseases.values().any(|s| s.contains(symptom))
    }

    pub fn symptoms_of(&self, disease: &str) -> Option<BTreeSet<String>> {
        self.diseases.get(disease).cloned()
    }

    pub fn all_diseases(&self) -> BTreeSet<String> {
        self.diseases.keys().cloned().collect()
    }

    pub fn all_symptoms(&self) -> BTreeSet<String> {
        self.diseases.values().flatten().cloned().collect()
    }

    /// Diseases that cause `symptom`, in identifier order.
    pub fn parents_of(&self, symptom: &str) -> Vec<String> {
        self.diseases
            .iter()
            .filter(|(_, symptoms)| symptoms.contains(symptom))
            .map(|(disease, _)| disease.clone())
            .collect()
    }

    /// Symptom → ordered parent diseases, for every known symptom.
    pub fn parent_map(&self) -> BTreeMap<&str, Vec<&str>> {
        let mut map: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (disease, symptoms) in &self.diseases {
            for symptom in symptoms {
                map.entry(symptom.as_str()).or_default().push(disease.as_str());
            }
        }
        map
    }

    /// Every (disease, symptom) causal edge, ordered by disease then symptom.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.diseases
            .iter()
            .flat_map(|(d, symptoms)| symptoms.iter().map(move |s| (d.as_str(), s.as_str())))
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&String, &BTreeSet<String>)> + '_ {
        self.diseases.iter()
    }

    /// Feed entries describing the current state, one per disease.
    pub fn to_entries(&self) -> Vec<KnowledgeEntry> {
        self.diseases
            .iter()
            .map(|(disease, symptoms)| KnowledgeEntry {
                disease: disease.clone(),
                symptoms: symptoms.iter().cloned().collect(),
            })
            .collect()
    }

    pub fn disease_count(&self) -> usize {
        self.diseases.len()
    }

    pub fn symptom_count(&self) -> usize {
        self.all_symptoms().len()
    }

    pub fn edge_count(&self) -> usize {
        self.diseases.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.diseases.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> KnowledgeBase {
        let mut kb = KnowledgeBase::new();
        kb.add_disease_symptoms("Flu", ["Fever", "Cough", "Fatigue"]);
        kb.add_disease_symptoms("Cold", ["Fever", "Cough"]);
        kb
    }

    #[test]
    fn add_is_an_idempotent_union() {
        let mut kb = seeded();
        kb.add_disease_symptoms("Cold", ["Cough", "Sneezing"]);
        kb.add_disease_symptoms("Cold", ["Cough", "Sneezing"]);
        let cold = kb.symptoms_of("Cold").unwrap();
        assert_eq!(cold.len(), 3);
        assert!(kb.contains_symptom("Sneezing"));
    }

    #[test]
    fn remove_drops_orphaned_symptoms_only() {
        let mut kb = seeded();
        assert!(kb.remove_disease("Flu"));
        assert!(!kb.contains_symptom("Fatigue"));
        assert!(kb.contains_symptom("Fever"));
        assert_eq!(kb.all_symptoms().len(), 2);
        assert!(!kb.remove_disease("Flu"));
    }

    #[test]
    fn snapshots_do_not_alias_storage() {
        let mut kb = seeded();
        let before = kb.all_symptoms();
        kb.add_disease_symptoms("Flu", ["Headache"]);
        assert!(!before.contains("Headache"));
        assert!(kb.all_symptoms().contains("Headache"));
    }

    #[test]
    fn ingest_is_last_write_wins() {
        let entries = vec![
            KnowledgeEntry::new("Flu", ["Fever", "Cough"]).unwrap(),
            KnowledgeEntry::new("Flu", ["Chills"]).unwrap(),
        ];
        let kb = KnowledgeBase::from_entries(&entries);
        let flu = kb.symptoms_of("Flu").unwrap();
        assert_eq!(flu.into_iter().collect::<Vec<_>>(), vec!["Chills"]);
        assert!(!kb.contains_symptom("Fever"));
    }

    #[test]
    fn update_ignores_unknown_disease() {
        let mut kb = seeded();
        assert!(!kb.update_disease_symptoms("Measles", ["Rash"]));
        assert!(!kb.contains_disease("Measles"));
        assert!(kb.update_disease_symptoms("Cold", ["Sneezing"]));
        assert_eq!(kb.parents_of("Sneezing"), vec!["Cold"]);
    }

    #[test]
    fn parent_map_and_edges_are_ordered() {
        let kb = seeded();
        let parents = kb.parent_map();
        assert_eq!(parents["Fever"], vec!["Cold", "Flu"]);
        assert_eq!(parents["Fatigue"], vec!["Flu"]);
        let edges: Vec<_> = kb.edges().collect();
        assert_eq!(edges.first(), Some(&("Cold", "Cough")));
        assert_eq!(kb.edge_count(), 5);
    }
}
