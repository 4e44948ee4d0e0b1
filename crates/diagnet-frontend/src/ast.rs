//! Parsed knowledge feed.

use crate::errors::{FrontendError, SourcePosition};

/// Maximum number of skipped lines kept verbatim in an [`IngestReport`].
pub const MAX_SKIP_EXAMPLES: usize = 5;

/// One `<Disease> has symptoms ...` statement.
///
/// Symptoms keep their order of appearance with duplicates removed.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KnowledgeEntry {
    pub disease: String,
    pub symptoms: Vec<String>,
}

impl KnowledgeEntry {
    /// Builds an entry from already-split text, trimming whitespace and
    /// dropping empty or repeated symptoms.
    pub fn new<I, S>(disease: impl AsRef<str>, symptoms: I) -> Result<Self, FrontendError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let disease = disease.as_ref().trim();
        if disease.is_empty() {
            return Err(FrontendError::ValidationError(
                "disease name must not be empty".into(),
            ));
        }
        let mut cleaned: Vec<String> = Vec::new();
        for symptom in symptoms {
            let symptom = symptom.as_ref().trim();
            if !symptom.is_empty() && !cleaned.iter().any(|s| s == symptom) {
                cleaned.push(symptom.to_string());
            }
        }
        if cleaned.is_empty() {
            return Err(FrontendError::ValidationError(format!(
                "disease '{}' needs at least one symptom",
                disease
            )));
        }
        Ok(Self {
            disease: disease.to_string(),
            symptoms: cleaned,
        })
    }
}

/// A line that was dropped during ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SkippedLine {
    pub position: SourcePosition,
    pub text: String,
    pub error: FrontendError,
}

/// Outcome of reading a whole feed: what was kept and what was dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IngestReport {
    /// Non-blank, non-comment lines examined.
    pub lines_read: usize,
    pub accepted: usize,
    /// Total number of dropped lines, including those not kept in `examples`.
    pub skipped: usize,
    /// The first [`MAX_SKIP_EXAMPLES`] dropped lines.
    pub examples: Vec<SkippedLine>,
}

impl IngestReport {
    pub fn is_clean(&self) -> bool {
        self.skipped == 0
    }

    pub(crate) fn record_skip(&mut self, skipped: SkippedLine) {
        self.skipped += 1;
        if self.examples.len() < MAX_SKIP_EXAMPLES {
            self.examples.push(skipped);
        }
    }
}

/// Entries in feed order plus the ingestion report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KnowledgeFeed {
    pub entries: Vec<KnowledgeEntry>,
    pub report: IngestReport,
}
