//! Collaborator contracts.
//!
//! The extraction core composes the output of services it does not own:
//! NER models, line classifiers, name and address parsers, gender and
//! postal lookups. Each one sits behind a small trait so the pipeline can
//! be driven by real models in production and by scripted fakes in tests.
//!
//! Fallible collaborators return `anyhow::Result`; the task that invoked
//! them wraps the error with its own name and aborts the run.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use url::Url;

/// Entity groups produced by the NER collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntityGroup {
    Org,
    Loc,
    Per,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedEntity {
    pub group: EntityGroup,
    pub text: String,
    /// Model confidence in [0, 1]
    pub confidence: f32,
}

impl RecognizedEntity {
    pub fn new(group: EntityGroup, text: impl Into<String>, confidence: f32) -> Self {
        Self {
            group,
            text: text.into(),
            confidence,
        }
    }
}

/// Named-entity recognition over a single line
pub trait EntityRecognizer: Send + Sync {
    fn recognize(&self, line: &str) -> Result<Vec<RecognizedEntity>>;
}

/// Learned line classifier backing the classifier relevance filter
pub trait LineClassifier: Send + Sync {
    /// True when the line is relevant contact data
    fn is_relevant(&self, line: &str) -> Result<bool>;
}

/// Splits a person mention into labelled components.
///
/// Labels follow the usual name-parser vocabulary: `GivenName`,
/// `MiddleName`, `Surname`, `PrefixMarital`, `PrefixOther`. Unknown labels
/// are ignored by the person task.
pub trait NameParser: Send + Sync {
    fn parse(&self, person: &str) -> Result<Vec<(String, String)>>;
}

/// Splits an address line into labelled components.
///
/// Labels follow the libpostal vocabulary: `house_number`, `road`,
/// `postcode`, `city`, `state`, `country`, `po_box`, ...
pub trait AddressParser: Send + Sync {
    fn parse(&self, line: &str) -> Result<Vec<(String, String)>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InferredGender {
    Male,
    Female,
    Unknown,
}

pub trait GenderInference: Send + Sync {
    fn infer(&self, first_name: &str) -> Result<InferredGender>;
}

/// Maps a postal code to a state code
pub trait PostalLookup: Send + Sync {
    fn state_for(&self, zip: &str, country_code: &str) -> Result<Option<String>>;
}

/// Registrable parts of a host name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainParts {
    pub subdomain: Option<String>,
    pub domain: String,
    pub suffix: String,
}

impl DomainParts {
    /// `{subdomain or "www"}.{domain}.{suffix}`
    pub fn website(&self) -> String {
        format!(
            "{}.{}.{}",
            self.subdomain.as_deref().unwrap_or("www"),
            self.domain,
            self.suffix
        )
    }
}

pub trait DomainExtractor: Send + Sync {
    fn extract(&self, url: &str) -> Option<DomainParts>;
}

/// Domain splitting with `url` host parsing and a list of known
/// multi-label public suffixes. Everything else is treated as a
/// single-label suffix.
#[derive(Debug, Clone)]
pub struct SuffixListDomainExtractor {
    multi_label_suffixes: Vec<String>,
}

impl Default for SuffixListDomainExtractor {
    fn default() -> Self {
        Self::new(
            [
                "co.uk", "org.uk", "ac.uk", "gov.uk", "co.at", "or.at", "ac.at", "gv.at",
                "com.au", "net.au", "org.au", "co.nz", "com.br", "co.jp", "com.tr", "com.cn",
            ]
            .iter()
            .map(|suffix| suffix.to_string())
            .collect(),
        )
    }
}

impl SuffixListDomainExtractor {
    pub fn new(multi_label_suffixes: Vec<String>) -> Self {
        Self {
            multi_label_suffixes,
        }
    }
}

impl DomainExtractor for SuffixListDomainExtractor {
    fn extract(&self, url: &str) -> Option<DomainParts> {
        let url = url.trim();
        let parsed = if url.contains("://") {
            Url::parse(url).ok()?
        } else {
            Url::parse(&format!("http://{url}")).ok()?
        };
        let host = match parsed.host()? {
            url::Host::Domain(host) => host.trim_end_matches('.').to_lowercase(),
            _ => return None,
        };

        let labels: Vec<&str> = host.split('.').filter(|label| !label.is_empty()).collect();
        if labels.len() < 2 {
            return None;
        }

        let last_two = labels[labels.len() - 2..].join(".");
        let suffix_len = if labels.len() >= 3 && self.multi_label_suffixes.contains(&last_two) {
            2
        } else {
            1
        };

        let suffix = labels[labels.len() - suffix_len..].join(".");
        let domain = labels[labels.len() - suffix_len - 1].to_string();
        let subdomain = labels[..labels.len() - suffix_len - 1].join(".");

        Some(DomainParts {
            subdomain: if subdomain.is_empty() { None } else { Some(subdomain) },
            domain,
            suffix,
        })
    }
}

/// Bundle of collaborators handed to the pipeline builder and the assembler.
/// Only the collaborators a configured task needs must be present.
#[derive(Clone)]
pub struct Collaborators {
    pub recognizer: Option<Arc<dyn EntityRecognizer>>,
    pub line_classifier: Option<Arc<dyn LineClassifier>>,
    pub name_parser: Option<Arc<dyn NameParser>>,
    pub address_parser: Option<Arc<dyn AddressParser>>,
    pub gender_inference: Option<Arc<dyn GenderInference>>,
    pub postal_lookup: Option<Arc<dyn PostalLookup>>,
    pub domain_extractor: Arc<dyn DomainExtractor>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            recognizer: None,
            line_classifier: None,
            name_parser: None,
            address_parser: None,
            gender_inference: None,
            postal_lookup: None,
            domain_extractor: Arc::new(SuffixListDomainExtractor::default()),
        }
    }
}

impl Collaborators {
    pub fn with_recognizer(mut self, recognizer: Arc<dyn EntityRecognizer>) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    pub fn with_line_classifier(mut self, classifier: Arc<dyn LineClassifier>) -> Self {
        self.line_classifier = Some(classifier);
        self
    }

    pub fn with_name_parser(mut self, parser: Arc<dyn NameParser>) -> Self {
        self.name_parser = Some(parser);
        self
    }

    pub fn with_address_parser(mut self, parser: Arc<dyn AddressParser>) -> Self {
        self.address_parser = Some(parser);
        self
    }

    pub fn with_gender_inference(mut self, inference: Arc<dyn GenderInference>) -> Self {
        self.gender_inference = Some(inference);
        self
    }

    pub fn with_postal_lookup(mut self, lookup: Arc<dyn PostalLookup>) -> Self {
        self.postal_lookup = Some(lookup);
        self
    }

    pub fn with_domain_extractor(mut self, extractor: Arc<dyn DomainExtractor>) -> Self {
        self.domain_extractor = extractor;
        self
    }
}
