// Imprint Core Library
//
// Extracts structured contact data from the plain-text rendering of website
// imprint pages. Lines flow through a configured extraction pipeline; the
// claimed entities are folded into one contact record anchored on the
// imprint's organization.

pub mod types;
pub mod error;
pub mod config;
pub mod collaborators;
pub mod preprocessors;
pub mod tasks;
pub mod assembly;
pub mod processor;

// Re-export main types and functions for easy use
pub use types::*;
pub use error::{ExtractionError, Result};
pub use config::{AssemblyConfig, ConfigManager, CountrySettings, ExtractionConfig, TaskSpec};
pub use collaborators::Collaborators;
pub use tasks::{ExtractionPipeline, PipelineOutput};
pub use assembly::{assemble_record, AssemblyOutcome, BlockAssembler};
pub use processor::{ContactDataProcessor, ExtractionReport};
