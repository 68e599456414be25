//! Block assembly: from the entity stream to one contact record.
//!
//! ```text
//! entities (line order)
//!   │
//!   ├─► anchor selection ── organization mentions + crawled domains
//!   │
//!   ├─► BlockAssembler ───── Normal / Accumulating / Misleading
//!   │
//!   └─► post-processing ──── country, website, gender, zip, state, vat,
//!                            organization display name
//! ```

pub mod anchor;
pub mod assembler;
pub mod postprocess;
pub mod similarity;

pub use anchor::{normalize_organization, select_anchor};
pub use assembler::{AssemblyState, BlockAssembler, PendingField};
pub use postprocess::{post_process, restore_organization};
pub use similarity::{basename, fold_diacritics, token_set_ratio, unfold_words};

use crate::collaborators::Collaborators;
use crate::config::AssemblyConfig;
use crate::error::{ExtractionError, Result};
use crate::types::{ContactRecord, CrawlContext, ExtractedEntity};
use tracing::info;

/// Result of assembling one document
#[derive(Debug, Clone)]
pub struct AssemblyOutcome {
    /// Normalized organization name the record is anchored on
    pub anchor: String,
    pub record: ContactRecord,
}

/// Select the anchor, run the block assembler and post-process `main`
pub fn assemble_record(
    entities: &[ExtractedEntity],
    context: &CrawlContext,
    config: &AssemblyConfig,
    collaborators: &Collaborators,
) -> Result<AssemblyOutcome> {
    let organizations: Vec<&str> = entities
        .iter()
        .filter(|entity| entity.is_organization())
        .map(|entity| entity.matched.as_str())
        .collect();

    let domain_labels: Vec<String> = [&context.crawled_website, &context.crawled_imprint]
        .into_iter()
        .filter_map(|url| collaborators.domain_extractor.extract(url))
        .map(|parts| parts.domain)
        .collect();

    let anchor = select_anchor(&organizations, &domain_labels, &config.legal_forms)
        .ok_or(ExtractionError::NoOrganizationFound)?;
    info!(anchor = %anchor, organizations = organizations.len(), "anchor organization selected");

    let mut record = BlockAssembler::new(&anchor, config.clone()).assemble(entities)?;
    post_process(&mut record.main, &anchor, entities, context, collaborators)?;

    Ok(AssemblyOutcome { anchor, record })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Field;

    #[test]
    fn test_assemble_record_end_to_end() {
        let entities = vec![
            ExtractedEntity::new("organization", "Müller Bau GmbH", 0),
            ExtractedEntity::new("street_road", "Hauptstraße", 1),
            ExtractedEntity::new("street_house_number", "1", 1),
            ExtractedEntity::new("zip", "1010", 2),
            ExtractedEntity::new("email", "office@mueller-bau.at", 3),
        ];
        let context = CrawlContext::new("AT", "https://mueller-bau.at", "https://mueller-bau.at/impressum");
        let outcome = assemble_record(
            &entities,
            &context,
            &AssemblyConfig::default(),
            &Collaborators::default(),
        )
        .unwrap();

        assert_eq!(outcome.anchor, "Mueller Bau GmbH");
        let main = &outcome.record.main;
        assert_eq!(main.get(Field::Organization), Some("Müller Bau GmbH"));
        assert_eq!(main.get(Field::Street), Some("Hauptstraße 1"));
        assert_eq!(main.get(Field::Website), Some("www.mueller-bau.at"));
        assert_eq!(main.get(Field::Email), Some("office@mueller-bau.at"));
    }

    #[test]
    fn test_no_organization_is_an_error() {
        let context = CrawlContext::new("AT", "https://acme.at", "https://acme.at/impressum");
        let result = assemble_record(
            &[ExtractedEntity::new("email", "a@acme.at", 0)],
            &context,
            &AssemblyConfig::default(),
            &Collaborators::default(),
        );
        assert!(matches!(result, Err(ExtractionError::NoOrganizationFound)));
    }
}
