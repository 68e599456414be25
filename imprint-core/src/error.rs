//! Typed errors for imprint extraction.
//!
//! Library errors use `thiserror`; collaborator seams hand back
//! `anyhow::Error`, which is wrapped with the name of the failing task.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractionError {
    /// A pattern task was configured without a pattern
    #[error("task '{task}' has no match pattern configured")]
    MissingPatternConfiguration { task: String },

    /// A configured pattern does not compile
    #[error("task '{task}' has an invalid pattern: {source}")]
    InvalidPattern {
        task: String,
        #[source]
        source: regex::Error,
    },

    /// A task needs a collaborator that was not supplied
    #[error("task '{task}' requires the {collaborator} collaborator")]
    MissingCollaborator {
        task: String,
        collaborator: &'static str,
    },

    /// The entity stream contains no organization mention to anchor on
    #[error("no organization found in the extracted entities")]
    NoOrganizationFound,

    /// No settings are registered for the country
    #[error("no extraction settings for country code '{country_code}'")]
    UnknownCountry { country_code: String },

    /// A collaborator (NER, classifier, lookup) failed during a task
    #[error("collaborator failed in task '{task}': {source}")]
    Collaborator {
        task: String,
        #[source]
        source: anyhow::Error,
    },

    /// Settings could not be read or parsed
    #[error("config error: {0}")]
    Config(#[source] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ExtractionError>;
