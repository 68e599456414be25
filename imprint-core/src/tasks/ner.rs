//! NER backed tasks.
//!
//! All three tasks run the entity recognizer on each remaining line and
//! ignore recognitions below the configured confidence. They differ in what
//! they do with the surviving groups:
//!
//! ```text
//! ORG ──► organization
//! PER ──► NameParser ──► firstName_* / lastName / title_* (+ academic title)
//! LOC ──► AddressParser(line) ──► street_* / street2_* / city_* / zip / ...
//! ```

use super::engine::{ExtractionTask, TaskKind, TaskMatches};
use crate::collaborators::{AddressParser, EntityGroup, EntityRecognizer, NameParser, RecognizedEntity};
use crate::error::{ExtractionError, Result};
use crate::types::{Document, ExtractedEntity, ORGANIZATION};
use regex::Regex;
use std::sync::Arc;

fn recognize(
    task: &str,
    recognizer: &dyn EntityRecognizer,
    line: &str,
    group: EntityGroup,
    min_confidence: f32,
) -> Result<Vec<RecognizedEntity>> {
    let recognized = recognizer
        .recognize(line)
        .map_err(|source| ExtractionError::Collaborator {
            task: task.to_string(),
            source,
        })?;
    Ok(recognized
        .into_iter()
        .filter(|entity| entity.group == group && entity.confidence >= min_confidence)
        .collect())
}

// ===== ORGANIZATION =====

pub struct OrganizationTask {
    recognizer: Arc<dyn EntityRecognizer>,
    min_confidence: f32,
}

impl OrganizationTask {
    pub fn new(recognizer: Arc<dyn EntityRecognizer>, min_confidence: f32) -> Self {
        Self {
            recognizer,
            min_confidence,
        }
    }
}

impl ExtractionTask for OrganizationTask {
    fn name(&self) -> &str {
        "NerOrganization"
    }

    fn kind(&self) -> TaskKind {
        TaskKind::Ner
    }

    fn extract(&self, lines: &Document) -> Result<TaskMatches> {
        let mut matches = TaskMatches::new();
        for (index, line) in lines.iter() {
            let organizations = recognize(
                self.name(),
                self.recognizer.as_ref(),
                line,
                EntityGroup::Org,
                self.min_confidence,
            )?;
            for organization in organizations {
                let text = organization.text.trim();
                if !text.is_empty() {
                    matches.push(ExtractedEntity::new(ORGANIZATION, text, index));
                }
            }
        }
        Ok(matches)
    }
}

// ===== PERSON =====

const ACADEMIC_DEGREES: &[&str] = &[
    r"b\.\s*sc\.",
    r"bachelor\s*of\s*science",
    r"b\.\s*a\.",
    r"bachelor\s*of\s*arts",
    r"b\.\s*ed\.",
    r"bachelor\s*of\s*education",
    r"b\.\s*eng\.",
    r"bachelor\s*of\s*engineering",
    r"m\.\s*sc\.",
    r"master\s*of\s*science",
    r"m\.\s*res\.",
    r"master\s*of\s*research",
    r"mph",
    r"master\s*of\s*public\s*health",
    r"m\.\s*a\.",
    r"master\s*of\s*arts",
    r"m\.\s*ed\.",
    r"master\s*of\s*education",
    r"m\.\s*eng\.",
    r"master\s*of\s*engineering",
    r"m\.\s*b\.\s*eng\.",
    r"master\s*of\s*business\s*engineering",
    r"m\.\s*b\.\s*a\.",
    r"master\s*of\s*business\s*administration",
    r"dipl\.(?:-|\s*)ing\.",
    r"diplomingenieur",
    r"mag\.",
    r"ing\.",
    r"ll\.\s*m\.",
    r"master\s*of\s*laws",
    r"legum\s*magister",
    r"dr\.",
    r"ph\.\s*d\.",
    r"doktor",
    r"doctor",
    r"prof\.",
    r"professor",
    r"bsc",
    r"msc",
];

const TITLE: &str = "title";

/// Degrees start on a word boundary; those not ending in a period must also
/// end on one.
fn degree_regex(pattern: &str) -> String {
    let tail = if pattern.ends_with('.') { "" } else { r"\b" };
    format!(r"(?i)\b{pattern}{tail}")
}

fn person_entity_type(label: &str) -> Option<&'static str> {
    match label {
        "GivenName" => Some("firstName_given_name"),
        "MiddleName" => Some("firstName_middle_name"),
        "Surname" => Some("lastName"),
        "PrefixMarital" => Some("title_prefix_marital"),
        "PrefixOther" => Some("title_prefix_other"),
        _ => None,
    }
}

/// Person names split into components, with academic degrees written in
/// front of a first or middle name reported as a `title` entity.
pub struct PersonTask {
    recognizer: Arc<dyn EntityRecognizer>,
    parser: Arc<dyn NameParser>,
    min_confidence: f32,
    degrees: Vec<Regex>,
}

impl PersonTask {
    pub fn new(
        recognizer: Arc<dyn EntityRecognizer>,
        parser: Arc<dyn NameParser>,
        min_confidence: f32,
    ) -> Self {
        let degrees = ACADEMIC_DEGREES
            .iter()
            .filter_map(|pattern| Regex::new(&degree_regex(pattern)).ok())
            .collect();
        Self {
            recognizer,
            parser,
            min_confidence,
            degrees,
        }
    }

    /// Degrees found in a stretch of text, in reading order and without overlaps
    fn degrees_in(&self, segment: &str) -> Option<String> {
        let mut found: Vec<(usize, usize)> = self
            .degrees
            .iter()
            .filter_map(|degree| degree.find(segment))
            .map(|found| (found.start(), found.end()))
            .collect();
        // longest first when two degrees start at the same offset
        found.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));

        let mut titles = Vec::new();
        let mut covered = 0;
        for (start, end) in found {
            if start < covered {
                continue;
            }
            titles.push(&segment[start..end]);
            covered = end;
        }

        if titles.is_empty() {
            None
        } else {
            Some(titles.join(" "))
        }
    }

    fn components(&self, line: &str, index: usize) -> Result<Vec<ExtractedEntity>> {
        let persons = recognize(
            self.name(),
            self.recognizer.as_ref(),
            line,
            EntityGroup::Per,
            self.min_confidence,
        )?;

        let mut parsed = Vec::new();
        for person in persons {
            let labelled = self
                .parser
                .parse(&person.text)
                .map_err(|source| ExtractionError::Collaborator {
                    task: self.name().to_string(),
                    source,
                })?;
            parsed.extend(labelled.into_iter().filter_map(|(text, label)| {
                person_entity_type(&label).map(|entity_type| (entity_type, text))
            }));
        }

        let mut entities = Vec::with_capacity(parsed.len());
        let mut cursor = 0;
        for (entity_type, text) in parsed {
            if let Some(offset) = line[cursor..].find(text.as_str()) {
                let start = cursor + offset;
                let is_first_name = entity_type.starts_with("firstName_");
                if is_first_name {
                    if let Some(title) = self.degrees_in(&line[cursor..start]) {
                        entities.push(ExtractedEntity::new(TITLE, title, index));
                    }
                }
                cursor = start + text.len();
            }
            entities.push(ExtractedEntity::new(entity_type, text, index));
        }
        Ok(entities)
    }
}

impl ExtractionTask for PersonTask {
    fn name(&self) -> &str {
        "NerPerson"
    }

    fn kind(&self) -> TaskKind {
        TaskKind::Ner
    }

    fn extract(&self, lines: &Document) -> Result<TaskMatches> {
        let mut matches = TaskMatches::new();
        for (index, line) in lines.iter() {
            for entity in self.components(line, index)? {
                matches.push(entity);
            }
        }
        Ok(matches)
    }
}

// ===== LOCATION =====

fn location_entity_type(label: &str) -> Option<&'static str> {
    match label {
        "po_box" => Some("poBox"),
        "postcode" => Some("zip"),
        "house_number" => Some("street_house_number"),
        "road" => Some("street_road"),
        "unit" => Some("street2_unit"),
        "level" => Some("street2_level"),
        "staircase" => Some("street2_staircase"),
        "entrance" => Some("street2_entrance"),
        "house" => Some("street2_house"),
        "category" => Some("street2_category"),
        "near" => Some("street2_near"),
        "suburb" => Some("city_suburb"),
        "city_district" => Some("city_city_district"),
        "city" => Some("city_city"),
        "state" | "state_district" => Some("state"),
        "country" => Some("country"),
        _ => None,
    }
}

/// Lines mentioning a location are handed whole to the address parser
pub struct LocationTask {
    recognizer: Arc<dyn EntityRecognizer>,
    parser: Arc<dyn AddressParser>,
    min_confidence: f32,
}

impl LocationTask {
    pub fn new(
        recognizer: Arc<dyn EntityRecognizer>,
        parser: Arc<dyn AddressParser>,
        min_confidence: f32,
    ) -> Self {
        Self {
            recognizer,
            parser,
            min_confidence,
        }
    }
}

impl ExtractionTask for LocationTask {
    fn name(&self) -> &str {
        "NerLocation"
    }

    fn kind(&self) -> TaskKind {
        TaskKind::Ner
    }

    fn extract(&self, lines: &Document) -> Result<TaskMatches> {
        let mut matches = TaskMatches::new();
        for (index, line) in lines.iter() {
            let locations = recognize(
                self.name(),
                self.recognizer.as_ref(),
                line,
                EntityGroup::Loc,
                self.min_confidence,
            )?;
            if locations.is_empty() {
                continue;
            }

            let components = self
                .parser
                .parse(line)
                .map_err(|source| ExtractionError::Collaborator {
                    task: self.name().to_string(),
                    source,
                })?;
            for (text, label) in components {
                if let Some(entity_type) = location_entity_type(&label) {
                    matches.push(ExtractedEntity::new(entity_type, text, index));
                }
            }
        }
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Returns canned recognitions keyed by line
    struct ScriptedRecognizer(HashMap<&'static str, Vec<RecognizedEntity>>);

    impl EntityRecognizer for ScriptedRecognizer {
        fn recognize(&self, line: &str) -> anyhow::Result<Vec<RecognizedEntity>> {
            Ok(self.0.get(line).cloned().unwrap_or_default())
        }
    }

    struct FailingRecognizer;

    impl EntityRecognizer for FailingRecognizer {
        fn recognize(&self, _line: &str) -> anyhow::Result<Vec<RecognizedEntity>> {
            anyhow::bail!("model not loaded")
        }
    }

    /// Every token is a given name except the last, which is the surname
    struct NaiveNameParser;

    impl NameParser for NaiveNameParser {
        fn parse(&self, person: &str) -> anyhow::Result<Vec<(String, String)>> {
            let tokens: Vec<&str> = person.split_whitespace().collect();
            Ok(tokens
                .iter()
                .enumerate()
                .map(|(position, token)| {
                    let label = if position + 1 == tokens.len() {
                        "Surname"
                    } else {
                        "GivenName"
                    };
                    (token.to_string(), label.to_string())
                })
                .collect())
        }
    }

    struct FixedAddressParser;

    impl AddressParser for FixedAddressParser {
        fn parse(&self, _line: &str) -> anyhow::Result<Vec<(String, String)>> {
            Ok(vec![
                ("Hauptstraße".to_string(), "road".to_string()),
                ("1".to_string(), "house_number".to_string()),
                ("1010".to_string(), "postcode".to_string()),
                ("Wien".to_string(), "city".to_string()),
                ("somewhere".to_string(), "world_region".to_string()),
            ])
        }
    }

    fn recognizer(entries: Vec<(&'static str, Vec<RecognizedEntity>)>) -> Arc<dyn EntityRecognizer> {
        Arc::new(ScriptedRecognizer(entries.into_iter().collect()))
    }

    #[test]
    fn test_organization_respects_confidence() {
        let ner = recognizer(vec![
            ("Acme GmbH", vec![RecognizedEntity::new(EntityGroup::Org, " Acme GmbH ", 0.97)]),
            ("Beta AG", vec![RecognizedEntity::new(EntityGroup::Org, "Beta AG", 0.5)]),
        ]);
        let lines = Document::from_lines([(0, "Acme GmbH"), (1, "Beta AG")]);
        let entities = OrganizationTask::new(ner, 0.9)
            .extract(&lines)
            .unwrap()
            .into_entities();
        assert_eq!(entities, vec![ExtractedEntity::new(ORGANIZATION, "Acme GmbH", 0)]);
    }

    #[test]
    fn test_person_components_with_titles() {
        let line = "Prof. Dr. Toralf Haag und M. Sc. Thorsten Lohring";
        let ner = recognizer(vec![(
            line,
            vec![
                RecognizedEntity::new(EntityGroup::Per, "Toralf Haag", 0.99),
                RecognizedEntity::new(EntityGroup::Per, "Thorsten Lohring", 0.99),
            ],
        )]);
        let lines = Document::from_lines([(7, line)]);
        let entities = PersonTask::new(ner, Arc::new(NaiveNameParser), 0.9)
            .extract(&lines)
            .unwrap()
            .into_entities();
        let found: Vec<(&str, &str)> = entities
            .iter()
            .map(|e| (e.entity_type.as_str(), e.matched.as_str()))
            .collect();
        assert_eq!(
            found,
            vec![
                ("title", "Prof. Dr."),
                ("firstName_given_name", "Toralf"),
                ("lastName", "Haag"),
                ("title", "M. Sc."),
                ("firstName_given_name", "Thorsten"),
                ("lastName", "Lohring"),
            ]
        );
    }

    #[test]
    fn test_degrees_only_match_whole_words() {
        let ner = recognizer(vec![(
            "Marketing. Maria Huber",
            vec![RecognizedEntity::new(EntityGroup::Per, "Maria Huber", 0.95)],
        )]);
        let task = PersonTask::new(ner, Arc::new(NaiveNameParser), 0.9);
        assert_eq!(task.degrees_in("Marketing. "), None);
        assert_eq!(task.degrees_in("Leitung Mscprogramm "), None);
        assert_eq!(task.degrees_in("Teamchef Mphasis "), None);
        assert_eq!(task.degrees_in("Ing. "), Some("Ing.".to_string()));
        assert_eq!(task.degrees_in("Mag. Dipl.-Ing. "), Some("Mag. Dipl.-Ing.".to_string()));

        let lines = Document::from_lines([(3, "Marketing. Maria Huber")]);
        let entities = task.extract(&lines).unwrap().into_entities();
        assert!(entities.iter().all(|e| e.entity_type != "title"));
    }

    #[test]
    fn test_person_without_degree_has_no_title() {
        let ner = recognizer(vec![(
            "Maria Huber",
            vec![RecognizedEntity::new(EntityGroup::Per, "Maria Huber", 0.95)],
        )]);
        let lines = Document::from_lines([(0, "Maria Huber")]);
        let entities = PersonTask::new(ner, Arc::new(NaiveNameParser), 0.9)
            .extract(&lines)
            .unwrap()
            .into_entities();
        assert_eq!(entities.len(), 2);
        assert!(entities.iter().all(|e| e.entity_type != TITLE));
    }

    #[test]
    fn test_location_maps_known_labels() {
        let ner = recognizer(vec![(
            "Hauptstraße 1, 1010 Wien",
            vec![RecognizedEntity::new(EntityGroup::Loc, "Wien", 0.93)],
        )]);
        let lines = Document::from_lines([(3, "Hauptstraße 1, 1010 Wien"), (4, "Acme GmbH")]);
        let matches = LocationTask::new(ner, Arc::new(FixedAddressParser), 0.9)
            .extract(&lines)
            .unwrap();
        assert_eq!(matches.claimed_indices(), [3].into_iter().collect());
        let types: Vec<String> = matches
            .into_entities()
            .into_iter()
            .map(|e| e.entity_type)
            .collect();
        assert_eq!(types, vec!["street_road", "street_house_number", "zip", "city_city"]);
    }

    #[test]
    fn test_recognizer_failure_names_the_task() {
        let lines = Document::from_lines([(0, "Acme GmbH")]);
        let result = OrganizationTask::new(Arc::new(FailingRecognizer), 0.9).extract(&lines);
        match result {
            Err(ExtractionError::Collaborator { task, .. }) => assert_eq!(task, "NerOrganization"),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
