use super::engine::{ExtractionTask, TaskKind, TaskMatches};
use crate::error::{ExtractionError, Result};
use crate::types::{Document, ExtractedEntity};
use regex::Regex;
use std::collections::BTreeSet;

/// Generic regex task: every match on a line becomes an entity of the
/// configured type.
///
/// With a continuation keyword, a line that mentions the keyword but does not
/// match on its own is retried joined with the following line. A joined match
/// is attributed to the keyword line and claims the next line as well.
pub struct PatternTask {
    name: String,
    entity_type: String,
    pattern: Regex,
    capture_group: Option<usize>,
    continuation_keyword: Option<String>,
}

impl PatternTask {
    pub fn new(
        name: &str,
        entity_type: &str,
        pattern: Option<&str>,
        capture_group: Option<usize>,
        continuation_keyword: Option<&str>,
    ) -> Result<Self> {
        let source = pattern
            .filter(|pattern| !pattern.trim().is_empty())
            .ok_or_else(|| ExtractionError::MissingPatternConfiguration {
                task: name.to_string(),
            })?;
        let pattern = Regex::new(source).map_err(|source| ExtractionError::InvalidPattern {
            task: name.to_string(),
            source,
        })?;

        Ok(Self {
            name: name.to_string(),
            entity_type: entity_type.to_string(),
            pattern,
            capture_group,
            continuation_keyword: continuation_keyword
                .map(str::to_lowercase)
                .filter(|keyword| !keyword.is_empty()),
        })
    }

    fn find_all(&self, text: &str) -> Vec<String> {
        let group = self.capture_group.unwrap_or(0);
        self.pattern
            .captures_iter(text)
            .filter_map(|captures| captures.get(group))
            .map(|found| found.as_str().trim().to_string())
            .filter(|found| !found.is_empty())
            .collect()
    }

    fn mentions_keyword(&self, line: &str) -> bool {
        self.continuation_keyword
            .as_deref()
            .is_some_and(|keyword| line.to_lowercase().contains(keyword))
    }
}

impl ExtractionTask for PatternTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> TaskKind {
        TaskKind::Generic
    }

    fn extract(&self, lines: &Document) -> Result<TaskMatches> {
        let mut matches = TaskMatches::new();
        let mut consumed = BTreeSet::new();

        for (index, line) in lines.iter() {
            if consumed.contains(&index) {
                continue;
            }

            let found = self.find_all(line);
            if !found.is_empty() {
                for text in found {
                    matches.push(ExtractedEntity::new(&self.entity_type, text, index));
                }
                continue;
            }

            if !self.mentions_keyword(line) {
                continue;
            }
            let Some(next) = lines.get(index + 1) else {
                continue;
            };
            let joined = format!("{line}\n{next}");
            let found = self.find_all(&joined);
            if found.is_empty() {
                continue;
            }
            for text in found {
                matches.push(ExtractedEntity::new(&self.entity_type, text, index));
            }
            matches.claim(index + 1);
            consumed.insert(index + 1);
        }

        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(pattern: &str, capture_group: Option<usize>, keyword: Option<&str>) -> PatternTask {
        PatternTask::new("test", "test", Some(pattern), capture_group, keyword).unwrap()
    }

    #[test]
    fn test_every_match_becomes_an_entity() {
        let lines = Document::from_lines([(0, "office@acme.at, sales@acme.at"), (1, "Acme GmbH")]);
        let entities = task(r"[a-z]+@[a-z]+\.[a-z]+", None, None)
            .extract(&lines)
            .unwrap()
            .into_entities();
        let found: Vec<&str> = entities.iter().map(|e| e.matched.as_str()).collect();
        assert_eq!(found, vec!["office@acme.at", "sales@acme.at"]);
        assert!(entities.iter().all(|e| e.line_index == 0));
    }

    #[test]
    fn test_capture_group_is_the_match() {
        let lines = Document::from_lines([(3, "BIC: GIBAATWWXXX")]);
        let entities = task(r"BIC:\s*([A-Z]{11})", Some(1), None)
            .extract(&lines)
            .unwrap()
            .into_entities();
        assert_eq!(entities[0].matched, "GIBAATWWXXX");
    }

    #[test]
    fn test_continuation_across_line_break() {
        let lines = Document::from_lines([(4, "DVR-Nummer:"), (5, "0123456"), (6, "Wien")]);
        let matches = task(r"(?i)dvr[^\n]*?\n?[^\n0-9]*([0-9]{7})", Some(1), Some("DVR"))
            .extract(&lines)
            .unwrap();
        assert_eq!(matches.claimed_indices(), [4, 5].into_iter().collect());
        let entities = matches.into_entities();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].line_index, 4);
        assert_eq!(entities[0].matched, "0123456");
    }

    #[test]
    fn test_no_continuation_without_next_line() {
        let lines = Document::from_lines([(4, "DVR-Nummer:"), (6, "0123456")]);
        let matches = task(r"(?i)dvr[^\n]*?\n?[^\n0-9]*([0-9]{7})", Some(1), Some("dvr"))
            .extract(&lines)
            .unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn test_missing_pattern() {
        assert!(matches!(
            PatternTask::new("vat", "vat", None, None, None),
            Err(ExtractionError::MissingPatternConfiguration { .. })
        ));
        assert!(matches!(
            PatternTask::new("vat", "vat", Some("  "), None, None),
            Err(ExtractionError::MissingPatternConfiguration { .. })
        ));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(matches!(
            PatternTask::new("vat", "vat", Some("(unclosed"), None, None),
            Err(ExtractionError::InvalidPattern { .. })
        ));
    }
}
