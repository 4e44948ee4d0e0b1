//! # Knowledge Feed Parser
//!
//! Turns free-text knowledge lines into [`KnowledgeEntry`] values using the
//! Pest parser generator.
//!
//! ## Accepted form
//!
//! ```text
//! Influenza has symptoms Fever, Cough, Fatigue.
//! Common Cold symptoms include Sneezing, Runny nose
//! ```
//!
//! The connector (`has symptoms`, `has symptom`, `symptoms include`) is matched
//! case-insensitively. Everything before it is the disease; everything after it,
//! minus one trailing period, is a comma-separated symptom list. No other
//! normalization is applied: identifiers are case-preserving.
//!
//! ## Error Handling
//!
//! A single line either yields an entry or a [`FrontendError`]. Whole feeds never
//! fail: rejected lines are recorded in the [`IngestReport`] and parsing goes on.
//!
//! ## Grammar
//!
//! The grammar is defined in `grammar.pest` at the crate root.

use crate::ast::{IngestReport, KnowledgeEntry, KnowledgeFeed, SkippedLine};
use crate::errors::{FrontendError, LineDefect, SourcePosition};
use pest::Parser;
use pest_derive::Parser;

#[derive(Parser)]
#[grammar = "../grammar.pest"]
pub struct KnowledgeParser;

const CONNECTORS: [&str; 3] = ["has symptoms", "has symptom", "symptoms include"];

/// Parses one knowledge line.
///
/// # Example
///
/// ```rust
/// use diagnet_frontend::parse_knowledge_line;
///
/// let entry = parse_knowledge_line("Flu has symptoms Fever, Cough, Fatigue.").unwrap();
/// assert_eq!(entry.disease, "Flu");
/// assert_eq!(entry.symptoms, vec!["Fever", "Cough", "Fatigue"]);
/// ```
pub fn parse_knowledge_line(line: &str) -> Result<KnowledgeEntry, FrontendError> {
    let mut pairs = match KnowledgeParser::parse(Rule::line, line) {
        Ok(pairs) => pairs,
        Err(e) => return Err(classify_failure(line, e)),
    };

    let line_pair = pairs
        .next()
        .ok_or_else(|| FrontendError::ParseError("empty parse tree".to_string()))?;
    debug_assert_eq!(line_pair.as_rule(), Rule::line);

    let mut disease = "";
    let mut symptoms: Vec<&str> = Vec::new();
    for p in line_pair.into_inner() {
        match p.as_rule() {
            Rule::disease => disease = p.as_str(),
            Rule::symptoms => {
                symptoms.extend(
                    p.into_inner()
                        .filter(|s| s.as_rule() == Rule::symptom)
                        .map(|s| s.as_str()),
                );
            }
            _ => {}
        }
    }

    if disease.trim().is_empty() {
        return Err(FrontendError::defect(LineDefect::EmptyDisease));
    }
    if symptoms.iter().all(|s| s.trim().is_empty()) {
        return Err(FrontendError::defect(LineDefect::EmptySymptomList));
    }
    KnowledgeEntry::new(disease, symptoms)
}

/// Parses a whole knowledge file.
///
/// Blank lines and lines starting with `#` are ignored. Every other line is
/// either accepted or recorded as skipped with its 1-based line number.
/// Entries are returned in file order; repeated diseases are all kept so that
/// the consumer can apply last-write-wins.
pub fn parse_knowledge(source: &str) -> KnowledgeFeed {
    let mut entries = Vec::new();
    let mut report = IngestReport::default();

    for (idx, raw) in source.lines().enumerate() {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        report.lines_read += 1;
        match parse_knowledge_line(raw) {
            Ok(entry) => {
                report.accepted += 1;
                entries.push(entry);
            }
            Err(error) => report.record_skip(SkippedLine {
                position: SourcePosition {
                    line: (idx + 1) as u32,
                    column: (raw.len() - raw.trim_start().len() + 1) as u32,
                },
                text: trimmed.to_string(),
                error,
            }),
        }
    }

    KnowledgeFeed { entries, report }
}

fn classify_failure(line: &str, err: pest::error::Error<Rule>) -> FrontendError {
    let lowered = line.trim_start().to_lowercase();
    if CONNECTORS.iter().any(|c| lowered.starts_with(c)) {
        return FrontendError::defect(LineDefect::EmptyDisease);
    }
    if !CONNECTORS.iter().any(|c| lowered.contains(c)) {
        return FrontendError::defect(LineDefect::MissingConnector);
    }
    FrontendError::ParseError(err.to_string())
}
