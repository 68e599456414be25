use super::engine::{ExtractionTask, TaskKind, TaskMatches};
use crate::error::Result;
use crate::types::{Document, ExtractedEntity};
use std::collections::BTreeSet;

/// How a configured term must sit in a line to count as a match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermMatchMode {
    /// Only at a lexical boundary (line start, digit or separator punctuation)
    Standalone,
    /// Any substring occurrence
    ArbitraryPosition,
}

// Separators allowed right before a standalone term
const LEADING_SEPARATORS: &str = "-:/\\.";
// Separators allowed right after a standalone term; a plain space also counts
const TRAILING_SEPARATORS: &str = "-: /\\.";

/// Claims every line that mentions one of the configured terms. A matched
/// line that ends mid-sentence (last token ends in `:` or `,`) also claims
/// the following line, which usually carries the value.
pub struct TermTask {
    name: String,
    entity_type: String,
    terms: Vec<String>,
    mode: TermMatchMode,
}

impl TermTask {
    pub fn new(entity_type: &str, terms: &[String], mode: TermMatchMode) -> Self {
        let name = match mode {
            TermMatchMode::Standalone => "TermsStandalone",
            TermMatchMode::ArbitraryPosition => "TermsArbitraryPosition",
        };
        Self {
            name: name.to_string(),
            entity_type: entity_type.to_string(),
            terms: terms
                .iter()
                .map(|term| term.to_lowercase())
                .filter(|term| !term.is_empty())
                .collect(),
            mode,
        }
    }

    fn matches_line(&self, line: &str) -> bool {
        let lower = line.to_lowercase();
        self.terms.iter().any(|term| match self.mode {
            TermMatchMode::Standalone => is_standalone(term, &lower),
            TermMatchMode::ArbitraryPosition => lower.contains(term.as_str()),
        })
    }
}

impl ExtractionTask for TermTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> TaskKind {
        match self.mode {
            TermMatchMode::Standalone => TaskKind::TermsStandalone,
            TermMatchMode::ArbitraryPosition => TaskKind::TermsArbitrary,
        }
    }

    fn extract(&self, lines: &Document) -> Result<TaskMatches> {
        let mut matched = BTreeSet::new();
        let mut incomplete = BTreeSet::new();

        for (index, line) in lines.iter() {
            if self.matches_line(line) {
                matched.insert(index);
                if !contains_complete_content(line) {
                    incomplete.insert(index);
                }
            }
        }

        // A continuation index is added at most once; BTreeSet takes care of it
        let continuations: BTreeSet<usize> = incomplete
            .iter()
            .map(|index| index + 1)
            .filter(|next| lines.contains(*next) && !matched.contains(next))
            .collect();

        let mut matches = TaskMatches::new();
        for index in matched.iter().chain(continuations.iter()) {
            if let Some(text) = lines.get(*index) {
                matches.push(ExtractedEntity::new(&self.entity_type, text, *index));
            }
        }
        Ok(matches)
    }
}

/// False when the line's last whitespace-delimited token ends in `:` or `,`
pub fn contains_complete_content(line: &str) -> bool {
    match line.split_whitespace().last() {
        Some(token) => !(token.ends_with(':') || token.ends_with(',')),
        None => true,
    }
}

/// Whether any occurrence of `term` in `line` sits at a lexical boundary.
///
/// Both arguments are expected in lowercase. An occurrence qualifies when it
/// starts the line, when the preceding character is a digit or one of
/// `- : / \ .`, or when the following character is a digit, one of those
/// separators or a space. An occurrence that ends the line also qualifies.
pub fn is_standalone(term: &str, line: &str) -> bool {
    if term.is_empty() {
        return false;
    }
    line.match_indices(term).any(|(start, _)| {
        if start == 0 {
            return true;
        }
        let before = line[..start].chars().next_back();
        if before.is_some_and(|c| c.is_ascii_digit() || LEADING_SEPARATORS.contains(c)) {
            return true;
        }
        match line[start + term.len()..].chars().next() {
            Some(after) => after.is_ascii_digit() || TRAILING_SEPARATORS.contains(after),
            None => true,
        }
    })
}
