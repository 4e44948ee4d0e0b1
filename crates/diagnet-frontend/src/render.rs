//! Canonical rendering of knowledge entries.
//!
//! Output always re-parses to the same entries through
//! [`crate::parser::parse_knowledge`].

use crate::ast::KnowledgeEntry;

/// Renders one entry as `<Disease> has symptoms <S1>, <S2>.`
pub fn render_entry(entry: &KnowledgeEntry) -> String {
    let symptoms: Vec<&str> = entry.symptoms.iter().map(|s| s.trim()).collect();
    format!("{} has symptoms {}.", entry.disease.trim(), symptoms.join(", "))
}

/// Renders a full knowledge file: one line per disease, sorted by disease,
/// joined with `\n` and without a trailing newline.
///
/// When a disease appears more than once the last entry wins, matching how
/// the feed is ingested.
pub fn render_knowledge<'a, I>(entries: I) -> String
where
    I: IntoIterator<Item = &'a KnowledgeEntry>,
{
    let mut latest: Vec<&KnowledgeEntry> = Vec::new();
    for entry in entries {
        match latest.iter_mut().find(|e| e.disease == entry.disease) {
            Some(slot) => *slot = entry,
            None => latest.push(entry),
        }
    }
    latest.sort_by(|a, b| a.disease.cmp(&b.disease));
    latest
        .into_iter()
        .map(render_entry)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_knowledge;

    fn entry(d: &str, s: &[&str]) -> KnowledgeEntry {
        KnowledgeEntry::new(d, s.iter().copied()).unwrap()
    }

    #[test]
    fn renders_single_entry() {
        let e = entry("Flu", &["Fever", "Cough"]);
        assert_eq!(render_entry(&e), "Flu has symptoms Fever, Cough.");
    }

    #[test]
    fn rewrite_is_sorted_and_last_write_wins() {
        let entries = vec![
            entry("Flu", &["Fever"]),
            entry("Cold", &["Cough"]),
            entry("Flu", &["Fever", "Fatigue"]),
        ];
        assert_eq!(
            render_knowledge(&entries),
            "Cold has symptoms Cough.\nFlu has symptoms Fever, Fatigue."
        );
    }

    #[test]
    fn rendered_knowledge_reparses_to_same_entries() {
        let entries = vec![
            entry("Asthma", &["Wheezing", "Shortness of breath"]),
            entry("Flu", &["Fever", "Cough"]),
        ];
        let feed = parse_knowledge(&render_knowledge(&entries));
        assert!(feed.report.is_clean());
        assert_eq!(feed.entries, entries);
    }
}
