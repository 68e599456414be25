use crate::error::{ExtractionError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;

// Default value functions for serde
fn default_similarity_cutoff() -> u8 {
    70
}

fn default_min_confidence() -> f32 {
    0.9
}

fn default_legal_forms() -> Vec<String> {
    [
        "gmbh", "gesmbh", "mbh", "ag", "kg", "og", "ohg", "gbr", "ug", "eu", "ev", "se", "co",
        "ltd", "inc", "llc", "plc", "corp", "kgaa", "sarl", "sa", "bv", "nv",
    ]
    .iter()
    .map(|form| form.to_string())
    .collect()
}

/// Settings for the block assembly stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyConfig {
    /// Token-set similarity (0-100) at or above which an organization mention
    /// is considered the same organization as the anchor
    #[serde(default = "default_similarity_cutoff")]
    pub similarity_cutoff: u8,
    /// Legal-form affixes stripped when computing an organization's basename.
    /// Compared lowercase with dots removed.
    #[serde(default = "default_legal_forms")]
    pub legal_forms: Vec<String>,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            similarity_cutoff: default_similarity_cutoff(),
            legal_forms: default_legal_forms(),
        }
    }
}

/// Country independent extraction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// NER entities below this confidence are ignored
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,
    #[serde(default)]
    pub assembly: AssemblyConfig,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
            assembly: AssemblyConfig::default(),
        }
    }
}

impl ExtractionConfig {
    /// Load from a YAML file. Missing keys take their defaults, so a file
    /// holding only `min_confidence` is valid.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ExtractionError::Config(e.into()))?;
        serde_yaml::from_str(&content).map_err(|e| ExtractionError::Config(e.into()))
    }
}

// ===== TASK DESCRIPTORS =====

/// Which relevance filter a pre-processing stage uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelevanceFilterKind {
    Dictionary,
    Classifier,
}

/// Tasks whose behavior depends on the document's country.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountryTask {
    Phone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NerRecognizer {
    Organization,
    Person,
    Location,
}

/// One step of the extraction pipeline, carrying exactly the parameters its
/// kind needs. The pipeline builder dispatches on the `kind` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskSpec {
    PreProcessing {
        filter: RelevanceFilterKind,
    },
    CountrySpecific {
        task: CountryTask,
    },
    TermsStandalone {
        entity_type: String,
    },
    TermsArbitrary {
        entity_type: String,
    },
    Ner {
        recognizer: NerRecognizer,
    },
    Generic {
        name: String,
        entity_type: String,
        #[serde(default)]
        pattern: Option<String>,
        /// Use this capture group as the match instead of the whole match
        #[serde(default)]
        capture_group: Option<usize>,
        /// Retry the pattern across a line break when the line contains this keyword
        #[serde(default)]
        continuation_keyword: Option<String>,
    },
}

impl TaskSpec {
    pub fn generic(name: &str, entity_type: &str, pattern: &str) -> Self {
        TaskSpec::Generic {
            name: name.to_string(),
            entity_type: entity_type.to_string(),
            pattern: Some(pattern.to_string()),
            capture_group: None,
            continuation_keyword: None,
        }
    }
}

// ===== COUNTRY SETTINGS =====

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TermSettings {
    /// Terms that only count at a lexical boundary
    #[serde(default)]
    pub standalone: Vec<String>,
    /// Terms that count anywhere in a line
    #[serde(default)]
    pub arbitrary_position: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountrySettings {
    pub country_code: String,
    /// International calling code without the plus sign, e.g. "43"
    #[serde(default)]
    pub calling_code: Option<String>,
    /// Lines containing any of these terms are dropped by the dictionary filter
    #[serde(default)]
    pub avoid: Vec<String>,
    #[serde(default)]
    pub terms: TermSettings,
    #[serde(default)]
    pub phone_pattern: Option<String>,
    /// Pipeline configuration - defines which tasks run and in what order
    #[serde(default)]
    pub pipeline: Vec<TaskSpec>,
}

impl CountrySettings {
    /// Load settings from a YAML file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ExtractionError::Config(e.into()))?;
        let settings: CountrySettings =
            serde_yaml::from_str(&content).map_err(|e| ExtractionError::Config(e.into()))?;
        Ok(settings)
    }
}

const EMAIL_PATTERN: &str = r"[a-zA-Z0-9.\-+_]+(?:@|\(at\))[a-zA-Z0-9.\-+_]+\.[a-z]+";
const WEBSITE_PATTERN: &str =
    r#"(?i)\b(?:https?://|www\d{0,3}[.])[^\s()<>,;"']+[^\s()<>,;"'.!?:]"#;
const IBAN_PATTERN: &str = r"\b[A-Z]{2}[0-9]{2}(?:\s?[A-Z0-9]{4}){3,7}(?:\s?[A-Z0-9]{1,4})?\b";
const SWIFT_BIC_PATTERN: &str = r"(?i:bic|swift)[:\s]*([A-Z]{6}[A-Z0-9]{2}(?:[A-Z0-9]{3})?)\b";
const DVR_PATTERN: &str = r"(?i)dvr[^\n]*?\n?[^\n0-9]*([0-9]{7})";
const PHONE_PATTERN: &str = r"(?:\+|\b0)[0-9]*(?:[0-9]|/|\(|\)|-| ){6,}";

fn default_avoid_terms() -> Vec<String> {
    [
        "haftung",
        "gewähr",
        "urheberrechtlich",
        "streitbeilegung",
        "kommerziell",
        "persönlich",
        "impressum",
        "newsletter",
        "subscription",
        "inhalt",
        "einverstanden",
        "einverständ",
        "datenschutz",
    ]
    .iter()
    .map(|term| term.to_string())
    .collect()
}

/// The task order shared by the built-in countries. Only the registration and
/// VAT patterns differ between them.
fn default_pipeline(registration_pattern: &str, vat_pattern: &str) -> Vec<TaskSpec> {
    vec![
        TaskSpec::PreProcessing {
            filter: RelevanceFilterKind::Dictionary,
        },
        TaskSpec::CountrySpecific {
            task: CountryTask::Phone,
        },
        TaskSpec::generic("email", "email", EMAIL_PATTERN),
        TaskSpec::generic("website", "website", WEBSITE_PATTERN),
        TaskSpec::generic("iban", "iban", IBAN_PATTERN),
        TaskSpec::Generic {
            name: "swift_bic".to_string(),
            entity_type: "swiftBic".to_string(),
            pattern: Some(SWIFT_BIC_PATTERN.to_string()),
            capture_group: Some(1),
            continuation_keyword: None,
        },
        TaskSpec::generic("registration", "registrationNumber", registration_pattern),
        TaskSpec::generic("vat", "vat", vat_pattern),
        TaskSpec::Generic {
            name: "dvr".to_string(),
            entity_type: "dvr".to_string(),
            pattern: Some(DVR_PATTERN.to_string()),
            capture_group: Some(1),
            continuation_keyword: Some("dvr".to_string()),
        },
        TaskSpec::TermsStandalone {
            entity_type: "companyData".to_string(),
        },
        TaskSpec::TermsArbitrary {
            entity_type: "bankData".to_string(),
        },
        TaskSpec::Ner {
            recognizer: NerRecognizer::Organization,
        },
        TaskSpec::Ner {
            recognizer: NerRecognizer::Person,
        },
        TaskSpec::Ner {
            recognizer: NerRecognizer::Location,
        },
    ]
}

#[derive(Debug, Clone)]
pub struct ConfigManager {
    settings: HashMap<String, CountrySettings>,
}

impl ConfigManager {
    pub fn new() -> Self {
        let mut manager = Self {
            settings: HashMap::new(),
        };
        manager.load_builtin_settings();
        manager
    }

    /// Settings for a country code, case-insensitive
    pub fn get_settings(&self, country_code: &str) -> Result<&CountrySettings> {
        self.settings
            .get(&country_code.to_uppercase())
            .ok_or_else(|| ExtractionError::UnknownCountry {
                country_code: country_code.to_string(),
            })
    }

    pub fn insert(&mut self, settings: CountrySettings) {
        self.settings
            .insert(settings.country_code.to_uppercase(), settings);
    }

    pub fn load_settings_from_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let settings = CountrySettings::load_from_file(path)?;
        tracing::info!(country_code = %settings.country_code, "loaded custom country settings");
        self.insert(settings);
        Ok(())
    }

    pub fn country_codes(&self) -> Vec<&str> {
        let mut codes: Vec<&str> = self.settings.keys().map(String::as_str).collect();
        codes.sort_unstable();
        codes
    }

    fn load_builtin_settings(&mut self) {
        // Austria: Firmenbuch numbers and ATU VAT ids
        self.insert(CountrySettings {
            country_code: "AT".to_string(),
            calling_code: Some("43".to_string()),
            avoid: default_avoid_terms(),
            terms: TermSettings {
                standalone: vec!["ara".to_string()],
                arbitrary_position: vec!["konto".to_string()],
            },
            phone_pattern: Some(PHONE_PATTERN.to_string()),
            pipeline: default_pipeline(
                r"\bFN\s?[0-9]{1,6}\s?[a-zA-Z]\b",
                r"\bATU[-\s]?[0-9]{8}\b",
            ),
        });

        // Germany: Handelsregister numbers and DE VAT ids
        self.insert(CountrySettings {
            country_code: "DE".to_string(),
            calling_code: Some("49".to_string()),
            avoid: default_avoid_terms(),
            terms: TermSettings {
                standalone: vec!["ara".to_string()],
                arbitrary_position: vec!["konto".to_string()],
            },
            phone_pattern: Some(PHONE_PATTERN.to_string()),
            pipeline: default_pipeline(
                r"\bHR[AB]\s?[0-9]{1,6}\b",
                r"\bDE[-\s]?[0-9]{3}[-\s]?[0-9]{3}[-\s]?[0-9]{3}\b",
            ),
        });
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Stable fingerprint of any serializable settings object
pub fn calculate_config_hash<T: Serialize>(config: &T) -> Result<String> {
    let config_json = serde_json::to_string(config)
        .map_err(|e| ExtractionError::Config(anyhow::anyhow!("failed to serialize config for hashing: {e}")))?;

    let mut hasher = Sha256::new();
    hasher.update(config_json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}
