use super::engine::{ExtractionTask, TaskKind, TaskMatches};
use crate::error::{ExtractionError, Result};
use crate::types::{Document, ExtractedEntity};
use regex::Regex;

const TASK_NAME: &str = "phone";
const MIN_DIGITS: usize = 6;
const MAX_DIGITS: usize = 15;

// Text ending in the leading groups of an IBAN style account number
const ACCOUNT_GROUPS: &str = r"\b[A-Z]{2}[0-9]{2}(?:\s?[A-Z0-9]{4})*\s?$";

/// Country specific phone number extraction.
///
/// Numbers are normalized to E.164-like form using the country's calling
/// code. The label in front of a number decides whether it is reported as
/// `phone`, `mobile` or `fax`.
pub struct PhoneTask {
    pattern: Regex,
    account_groups: Regex,
    calling_code: Option<String>,
}

impl PhoneTask {
    pub fn new(pattern: Option<&str>, calling_code: Option<&str>) -> Result<Self> {
        let source = pattern
            .filter(|pattern| !pattern.trim().is_empty())
            .ok_or_else(|| ExtractionError::MissingPatternConfiguration {
                task: TASK_NAME.to_string(),
            })?;
        let compile = |source: &str| {
            Regex::new(source).map_err(|source| ExtractionError::InvalidPattern {
                task: TASK_NAME.to_string(),
                source,
            })
        };
        Ok(Self {
            pattern: compile(source)?,
            account_groups: compile(ACCOUNT_GROUPS)?,
            calling_code: calling_code
                .map(|code| code.trim_start_matches('+').to_string())
                .filter(|code| !code.is_empty()),
        })
    }

    /// Digits with an optional leading plus, in international form when the
    /// calling code is known. `None` for fragments too short or too long to
    /// be a number and for international numbers without a country code.
    pub fn normalize(&self, raw: &str) -> Option<String> {
        let raw = raw.trim_start();
        let international = raw.starts_with('+');
        // "+49 (0)40 ..." carries the national trunk prefix in parentheses
        let raw = if international {
            raw.replacen("(0)", "", 1)
        } else {
            raw.to_string()
        };
        let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
        if digits.len() < MIN_DIGITS {
            return None;
        }

        let normalized = if international {
            format!("+{digits}")
        } else if let Some(rest) = digits.strip_prefix("00") {
            format!("+{rest}")
        } else if let (Some(rest), Some(code)) = (digits.strip_prefix('0'), &self.calling_code) {
            format!("+{code}{rest}")
        } else {
            digits
        };

        let significant = normalized.trim_start_matches('+');
        if significant.len() > MAX_DIGITS || normalized.starts_with("+0") {
            return None;
        }
        Some(normalized)
    }

    /// A run that continues the digit groups of an account number
    fn continues_account_number(&self, before: &str) -> bool {
        self.account_groups.is_match(before)
    }
}

fn classify(label: &str) -> &'static str {
    let label = label.to_lowercase();
    if label.contains("fax") {
        "fax"
    } else if label.contains("mobil") {
        "mobile"
    } else {
        "phone"
    }
}

impl ExtractionTask for PhoneTask {
    fn name(&self) -> &str {
        TASK_NAME
    }

    fn kind(&self) -> TaskKind {
        TaskKind::CountrySpecific
    }

    fn extract(&self, lines: &Document) -> Result<TaskMatches> {
        let mut matches = TaskMatches::new();

        for (index, line) in lines.iter() {
            let mut previous_end = 0;
            for found in self.pattern.find_iter(line) {
                let label = &line[previous_end..found.start()];
                previous_end = found.end();

                if self.continues_account_number(&line[..found.start()]) {
                    continue;
                }
                if let Some(number) = self.normalize(found.as_str()) {
                    matches.push(ExtractedEntity::new(classify(label), number, index));
                }
            }
        }

        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PATTERN: &str = r"(?:\+|\b0)[0-9]*(?:[0-9]|/|\(|\)|-| ){6,}";

    fn austrian() -> PhoneTask {
        PhoneTask::new(Some(PATTERN), Some("43")).unwrap()
    }

    #[test]
    fn test_phone_and_fax_on_one_line() {
        let lines = Document::from_lines([(2, "Tel.: 01 234 56 78, Fax: 01 234 56 79")]);
        let entities = austrian().extract(&lines).unwrap().into_entities();
        let found: Vec<(&str, &str)> = entities
            .iter()
            .map(|e| (e.entity_type.as_str(), e.matched.as_str()))
            .collect();
        assert_eq!(found, vec![("phone", "+4312345678"), ("fax", "+4312345679")]);
    }

    #[test]
    fn test_mobile_label() {
        let lines = Document::from_lines([(0, "Mobil: +43 664 123 45 67")]);
        let entities = austrian().extract(&lines).unwrap().into_entities();
        assert_eq!(entities[0].entity_type, "mobile");
        assert_eq!(entities[0].matched, "+436641234567");
    }

    #[test]
    fn test_normalize() {
        let task = austrian();
        assert_eq!(task.normalize("0043 1 234567").as_deref(), Some("+431234567"));
        assert_eq!(task.normalize("12 34"), None);

        let without_code = PhoneTask::new(Some(PATTERN), None).unwrap();
        assert_eq!(without_code.normalize("01 234 56 78").as_deref(), Some("012345678"));
    }

    #[test]
    fn test_normalize_drops_trunk_prefix_after_country_code() {
        let task = austrian();
        assert_eq!(task.normalize("+49 (0)40 500250").as_deref(), Some("+4940500250"));
        assert_eq!(task.normalize("+43 (0) 1 234 56 78").as_deref(), Some("+4312345678"));
    }

    #[test]
    fn test_normalize_rejects_implausible_numbers() {
        let task = austrian();
        assert_eq!(task.normalize("0000 1234"), None);
        assert_eq!(task.normalize("+43 1234 5678 9012 3456"), None);
    }

    #[test]
    fn test_account_number_groups_are_not_numbers() {
        let lines = Document::from_lines([
            (0, "IBAN: AT02 2011 1000 0000 1234"),
            (1, "Tel.: 01 234 56 78"),
        ]);
        let entities = austrian().extract(&lines).unwrap().into_entities();
        assert_eq!(entities, vec![ExtractedEntity::new("phone", "+4312345678", 1)]);
    }

    #[test]
    fn test_digits_inside_identifiers_are_not_numbers() {
        let lines = Document::from_lines([(0, "UID: ATU12345678"), (1, "Firmenbuch: FN 123456 a")]);
        assert!(austrian().extract(&lines).unwrap().is_empty());
    }

    #[test]
    fn test_missing_pattern() {
        assert!(matches!(
            PhoneTask::new(None, Some("43")),
            Err(ExtractionError::MissingPatternConfiguration { .. })
        ));
    }
}
