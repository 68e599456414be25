// Relevance filtering for imprint lines
//
// This module defines the boundary between raw imprint text and extraction.
// A relevance filter decides per line whether it may carry contact data;
// everything after this point only sees the lines that passed.

use crate::collaborators::LineClassifier;
use anyhow::Result;
use std::sync::Arc;

/// Relevance filter trait - keeps or drops single lines
///
/// Filters never claim lines. A pre-processing stage replaces the working
/// pool with the lines the filter keeps.
pub trait RelevanceFilter: Send + Sync {
    fn is_relevant(&self, line: &str) -> Result<bool>;

    /// Get filter name for debugging/logging
    fn name(&self) -> &str;
}

const SOCIAL_NETWORKS: [&str; 4] = ["google", "facebook", "twitter", "instagram"];
const COOKIE: &str = "cookie";

/// Rule based filter: drops social network and cookie lines plus every line
/// containing a country specific avoid term.
pub struct DictionaryRelevanceFilter {
    avoid: Vec<String>,
}

impl DictionaryRelevanceFilter {
    pub fn new(avoid: &[String]) -> Self {
        Self {
            avoid: avoid
                .iter()
                .map(|term| term.to_lowercase())
                .filter(|term| !term.is_empty())
                .collect(),
        }
    }

    fn keeps(&self, line: &str) -> bool {
        let lower = line.to_lowercase();
        if SOCIAL_NETWORKS.iter().any(|network| lower.contains(network)) {
            return false;
        }
        if lower.contains(COOKIE) {
            return false;
        }
        !self.avoid.iter().any(|term| lower.contains(term.as_str()))
    }
}

impl RelevanceFilter for DictionaryRelevanceFilter {
    fn is_relevant(&self, line: &str) -> Result<bool> {
        Ok(self.keeps(line))
    }

    fn name(&self) -> &str {
        "DictionaryRelevance"
    }
}

/// Learned filter: defers to a line classifier collaborator
pub struct ClassifierRelevanceFilter {
    classifier: Arc<dyn LineClassifier>,
}

impl ClassifierRelevanceFilter {
    pub fn new(classifier: Arc<dyn LineClassifier>) -> Self {
        Self { classifier }
    }
}

impl RelevanceFilter for ClassifierRelevanceFilter {
    fn is_relevant(&self, line: &str) -> Result<bool> {
        self.classifier.is_relevant(line)
    }

    fn name(&self) -> &str {
        "ClassifierRelevance"
    }
}
