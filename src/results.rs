use serde::{Deserialize, Serialize};

/// A link pulled off a source page, before or after relevance filtering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateLink {
    /// Absolute, normalized URL (the dedupe key)
    pub url: String,

    /// Visible link text as it appeared on the page
    pub anchor_text: String,

    /// Short surrounding text snippet used for matching
    pub context: String,

    /// Name of the source that produced this link
    pub source_name: String,

    /// Classifier rationale, when one was requested and returned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl CandidateLink {
    /// Create a new candidate link
    pub fn new(url: String, anchor_text: String, context: String, source_name: &str) -> Self {
        Self {
            url,
            anchor_text,
            context,
            source_name: source_name.to_string(),
            reason: None,
        }
    }
}

/// A per-source failure carried in the run result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceError {
    pub source_name: String,
    pub message: String,
}

/// Outcome of one complete run over every configured source
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunResult {
    /// New relevant links, in source order then page order
    pub new_items: Vec<CandidateLink>,

    /// Sources that could not be fetched or parsed, in source order
    pub errors: Vec<SourceError>,
}

impl RunResult {
    /// True when nothing was found and nothing failed
    pub fn is_quiet(&self) -> bool {
        self.new_items.is_empty() && self.errors.is_empty()
    }

    /// Failure description recorded for a source, if any
    pub fn error_for(&self, source_name: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.source_name == source_name)
            .map(|e| e.message.as_str())
    }

    /// New items grouped by source, preserving first-appearance order
    pub fn items_by_source(&self) -> Vec<(&str, Vec<&CandidateLink>)> {
        let mut groups: Vec<(&str, Vec<&CandidateLink>)> = Vec::new();
        for item in &self.new_items {
            match groups.iter_mut().find(|(name, _)| *name == item.source_name) {
                Some((_, items)) => items.push(item),
                None => groups.push((item.source_name.as_str(), vec![item])),
            }
        }
        groups
    }
}
