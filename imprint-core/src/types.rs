use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

// ===== LINE TYPES =====
// A document is a set of numbered lines. Indices are assigned once, when the
// text is split, and never change afterwards. Claiming a line removes its
// index from the remaining pool for the rest of the run.

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    pub index: usize,
    pub text: String,
}

/// Snapshot of the lines still available to extraction tasks.
///
/// Snapshots are never mutated in place. Every narrowing step (`without`,
/// `retain`) produces a new snapshot, so a task can only ever see the pool
/// it was handed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    lines: BTreeMap<usize, String>,
}

impl Document {
    /// Split plain imprint text into numbered lines.
    ///
    /// Non-breaking spaces become plain spaces and blank lines are dropped
    /// before numbering, so consecutive indices are consecutive content lines.
    pub fn from_text(text: &str) -> Self {
        let lines = text
            .lines()
            .map(|line| line.replace('\u{a0}', " "))
            .filter(|line| !line.trim().is_empty())
            .enumerate()
            .collect();
        Self { lines }
    }

    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = (usize, S)>,
        S: Into<String>,
    {
        Self {
            lines: lines
                .into_iter()
                .map(|(index, text)| (index, text.into()))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.lines.contains_key(&index)
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.lines.get(&index).map(String::as_str)
    }

    /// Lines in ascending index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> + '_ {
        self.lines.iter().map(|(index, text)| (*index, text.as_str()))
    }

    pub fn indices(&self) -> BTreeSet<usize> {
        self.lines.keys().copied().collect()
    }

    pub fn to_lines(&self) -> Vec<Line> {
        self.iter()
            .map(|(index, text)| Line {
                index,
                text: text.to_string(),
            })
            .collect()
    }

    /// Set difference: the snapshot minus every claimed index.
    pub fn without(&self, claimed: &BTreeSet<usize>) -> Document {
        Document {
            lines: self
                .lines
                .iter()
                .filter(|(index, _)| !claimed.contains(index))
                .map(|(index, text)| (*index, text.clone()))
                .collect(),
        }
    }

    /// Keep only the given indices that are present in this snapshot.
    pub fn retain(&self, keep: &BTreeSet<usize>) -> Document {
        Document {
            lines: self
                .lines
                .iter()
                .filter(|(index, _)| keep.contains(index))
                .map(|(index, text)| (*index, text.clone()))
                .collect(),
        }
    }
}

// ===== ENTITY TYPES =====

/// Entity type emitted by the organization recognizer. Organization mentions
/// drive the block assembly and never go into `main` directly.
pub const ORGANIZATION: &str = "organization";

/// A typed match claimed from one line.
///
/// `entity_type` is either a simple field name (`email`) or a composite
/// `field_subfield` tag (`firstName_given_name`). Consecutive composite
/// entities with the same field prefix are merged into one value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedEntity {
    #[serde(rename = "type")]
    pub entity_type: String,
    #[serde(rename = "match")]
    pub matched: String,
    #[serde(rename = "index")]
    pub line_index: usize,
}

impl ExtractedEntity {
    pub fn new(entity_type: impl Into<String>, matched: impl Into<String>, line_index: usize) -> Self {
        Self {
            entity_type: entity_type.into(),
            matched: matched.into(),
            line_index,
        }
    }

    /// Field prefix of a composite type, `None` for simple types.
    pub fn composite_tag(&self) -> Option<&str> {
        self.entity_type
            .split_once('_')
            .map(|(tag, _)| tag)
            .filter(|tag| !tag.is_empty())
    }

    pub fn is_organization(&self) -> bool {
        self.entity_type == ORGANIZATION
    }
}

// ===== CONTACT RECORD =====

/// Fields of the primary contact block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    Organization,
    FirstName,
    LastName,
    Title,
    Street,
    Street2,
    City,
    Zip,
    State,
    Country,
    PoBox,
    Website,
    Email,
    Phone,
    Mobile,
    Fax,
    Vat,
    Position,
}

impl Field {
    pub const ALL: [Field; 18] = [
        Field::Organization,
        Field::FirstName,
        Field::LastName,
        Field::Title,
        Field::Street,
        Field::Street2,
        Field::City,
        Field::Zip,
        Field::State,
        Field::Country,
        Field::PoBox,
        Field::Website,
        Field::Email,
        Field::Phone,
        Field::Mobile,
        Field::Fax,
        Field::Vat,
        Field::Position,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Organization => "organization",
            Field::FirstName => "firstName",
            Field::LastName => "lastName",
            Field::Title => "title",
            Field::Street => "street",
            Field::Street2 => "street2",
            Field::City => "city",
            Field::Zip => "zip",
            Field::State => "state",
            Field::Country => "country",
            Field::PoBox => "poBox",
            Field::Website => "website",
            Field::Email => "email",
            Field::Phone => "phone",
            Field::Mobile => "mobile",
            Field::Fax => "fax",
            Field::Vat => "vat",
            Field::Position => "position",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownField(pub String);

impl fmt::Display for UnknownField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown contact field: {}", self.0)
    }
}

impl std::error::Error for UnknownField {}

impl FromStr for Field {
    type Err = UnknownField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::ALL
            .iter()
            .copied()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| UnknownField(s.to_string()))
    }
}

/// Inferred gender of the main contact person, serialized as 0 (male) or 1 (female).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Gender {
    Male,
    Female,
}

impl From<Gender> for u8 {
    fn from(gender: Gender) -> Self {
        match gender {
            Gender::Male => 0,
            Gender::Female => 1,
        }
    }
}

impl TryFrom<u8> for Gender {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Gender::Male),
            1 => Ok(Gender::Female),
            other => Err(format!("invalid gender code: {other}")),
        }
    }
}

/// The primary contact block. Every field is written at most once during
/// assembly; only post-processing may overwrite a value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MainFields {
    #[serde(flatten)]
    values: BTreeMap<Field, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
}

impl MainFields {
    pub fn get(&self, field: Field) -> Option<&str> {
        self.values.get(&field).map(String::as_str)
    }

    pub fn is_set(&self, field: Field) -> bool {
        self.values.contains_key(&field)
    }

    /// First-wins assignment. Returns false when the field is already occupied.
    pub fn set_if_empty(&mut self, field: Field, value: impl Into<String>) -> bool {
        if self.values.contains_key(&field) {
            return false;
        }
        self.values.insert(field, value.into());
        true
    }

    /// Unconditional write, reserved for post-processing normalizations.
    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        self.values.insert(field, value.into());
    }

    pub fn remove(&mut self, field: Field) -> Option<String> {
        self.values.remove(&field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> + '_ {
        self.values.iter().map(|(field, value)| (*field, value.as_str()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRecord {
    pub main: MainFields,
    /// Confirming mentions and values that lost the first-wins race.
    pub secondary: Vec<ExtractedEntity>,
    /// Entities belonging to a different organization's block.
    pub misleading: Vec<ExtractedEntity>,
}

// ===== DOCUMENT CONTEXT =====

/// Where an imprint text came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlContext {
    pub country_code: String,
    pub crawled_website: String,
    pub crawled_imprint: String,
}

impl CrawlContext {
    pub fn new(
        country_code: impl Into<String>,
        crawled_website: impl Into<String>,
        crawled_imprint: impl Into<String>,
    ) -> Self {
        Self {
            country_code: country_code.into(),
            crawled_website: crawled_website.into(),
            crawled_imprint: crawled_imprint.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_text_drops_blank_lines_and_nbsp() {
        let doc = Document::from_text("Acme\u{a0}GmbH\n\n   \nMain Street 1\n");
        assert_eq!(doc.len(), 2);
        assert_eq!(doc.get(0), Some("Acme GmbH"));
        assert_eq!(doc.get(1), Some("Main Street 1"));
    }

    #[test]
    fn test_without_is_set_difference() {
        let doc = Document::from_lines([(1, "a"), (2, "b"), (4, "c")]);
        let claimed: BTreeSet<usize> = [2, 7].into_iter().collect();
        let next = doc.without(&claimed);
        assert_eq!(next.indices(), [1, 4].into_iter().collect());
        // the original snapshot is untouched
        assert_eq!(doc.len(), 3);
    }

    #[test]
    fn test_composite_tag() {
        assert_eq!(
            ExtractedEntity::new("firstName_given_name", "Maria", 1).composite_tag(),
            Some("firstName")
        );
        assert_eq!(ExtractedEntity::new("email", "a@x.com", 1).composite_tag(), None);
    }

    #[test]
    fn test_field_round_trips_through_name() {
        for field in Field::ALL {
            assert_eq!(field.as_str().parse::<Field>(), Ok(field));
        }
        assert!("gender".parse::<Field>().is_err());
    }

    #[test]
    fn test_main_fields_first_wins() {
        let mut main = MainFields::default();
        assert!(main.set_if_empty(Field::Email, "a@x.com"));
        assert!(!main.set_if_empty(Field::Email, "b@y.com"));
        assert_eq!(main.get(Field::Email), Some("a@x.com"));
    }

    #[test]
    fn test_main_fields_serialize_camel_case_and_gender_code() {
        let mut main = MainFields::default();
        main.set(Field::FirstName, "Maria");
        main.gender = Some(Gender::Female);
        let json = serde_json::to_value(&main).unwrap();
        assert_eq!(json["firstName"], "Maria");
        assert_eq!(json["gender"], 1);
    }
}
