use super::anchor::normalize_organization;
use super::similarity::unfold_words;
use crate::collaborators::{Collaborators, InferredGender};
use crate::error::{ExtractionError, Result};
use crate::types::{CrawlContext, ExtractedEntity, Field, Gender, MainFields};
use tracing::debug;

const TASK_NAME: &str = "PostProcessing";

fn collaborator_error(source: anyhow::Error) -> ExtractionError {
    ExtractionError::Collaborator {
        task: TASK_NAME.to_string(),
        source,
    }
}

/// Display form of the anchor: the first organization mention that
/// normalizes to it, otherwise the anchor with the folded words of the
/// mentions restored.
pub fn restore_organization(anchor: &str, entities: &[ExtractedEntity]) -> String {
    let mentions: Vec<&str> = entities
        .iter()
        .filter(|entity| entity.is_organization())
        .map(|entity| entity.matched.as_str())
        .collect();
    mentions
        .iter()
        .find(|mention| normalize_organization(mention) == anchor)
        .map(|mention| mention.trim().to_string())
        .unwrap_or_else(|| unfold_words(anchor, &mentions))
}

/// Normalizations applied once to the assembled main block
pub fn post_process(
    main: &mut MainFields,
    anchor: &str,
    entities: &[ExtractedEntity],
    context: &CrawlContext,
    collaborators: &Collaborators,
) -> Result<()> {
    main.set(Field::Country, context.country_code.clone());

    if let Some(parts) = collaborators.domain_extractor.extract(&context.crawled_website) {
        main.set(Field::Website, parts.website());
    }

    main.gender = None;
    let first_name = main.get(Field::FirstName).map(str::to_string);
    if let (Some(first_name), Some(inference)) = (first_name, &collaborators.gender_inference) {
        main.gender = match inference.infer(&first_name).map_err(collaborator_error)? {
            InferredGender::Male => Some(Gender::Male),
            InferredGender::Female => Some(Gender::Female),
            InferredGender::Unknown => None,
        };
    }

    if let Some(zip) = main.get(Field::Zip) {
        let digits: String = zip.chars().filter(char::is_ascii_digit).collect();
        if digits.is_empty() {
            main.remove(Field::Zip);
        } else {
            main.set(Field::Zip, digits);
        }
    }

    if let (Some(zip), Some(lookup)) = (main.get(Field::Zip), &collaborators.postal_lookup) {
        let state = lookup
            .state_for(zip, &context.country_code)
            .map_err(collaborator_error)?;
        if let Some(state) = state {
            main.set(Field::State, state);
        }
    }

    if let Some(vat) = main.get(Field::Vat) {
        let compact: String = vat.chars().filter(|c| !c.is_whitespace() && *c != '-').collect();
        main.set(Field::Vat, compact);
    }

    let organization = restore_organization(anchor, entities);
    debug!(organization = %organization, "post-processed main block");
    main.set(Field::Organization, organization);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{GenderInference, PostalLookup};
    use crate::types::ORGANIZATION;
    use std::sync::Arc;

    struct FemaleNames;

    impl GenderInference for FemaleNames {
        fn infer(&self, first_name: &str) -> anyhow::Result<InferredGender> {
            Ok(if first_name.starts_with("Maria") {
                InferredGender::Female
            } else {
                InferredGender::Unknown
            })
        }
    }

    struct ViennaOnly;

    impl PostalLookup for ViennaOnly {
        fn state_for(&self, zip: &str, _country_code: &str) -> anyhow::Result<Option<String>> {
            Ok(zip.starts_with('1').then(|| "W".to_string()))
        }
    }

    fn context() -> CrawlContext {
        CrawlContext::new("AT", "https://www.mueller-bau.at", "https://www.mueller-bau.at/impressum")
    }

    #[test]
    fn test_normalizations() {
        let mut main = MainFields::default();
        main.set(Field::FirstName, "Maria Elena");
        main.set(Field::Zip, "A-1010");
        main.set(Field::Vat, "ATU 1234-5678");
        let entities = vec![ExtractedEntity::new("organization", "Müller Bau GmbH", 0)];
        let collaborators = Collaborators::default()
            .with_gender_inference(Arc::new(FemaleNames))
            .with_postal_lookup(Arc::new(ViennaOnly));

        post_process(&mut main, "Mueller Bau GmbH", &entities, &context(), &collaborators).unwrap();

        assert_eq!(main.get(Field::Country), Some("AT"));
        assert_eq!(main.get(Field::Website), Some("www.mueller-bau.at"));
        assert_eq!(main.gender, Some(Gender::Female));
        assert_eq!(main.get(Field::Zip), Some("1010"));
        assert_eq!(main.get(Field::State), Some("W"));
        assert_eq!(main.get(Field::Vat), Some("ATU12345678"));
        assert_eq!(main.get(Field::Organization), Some("Müller Bau GmbH"));
    }

    #[test]
    fn test_state_kept_when_lookup_has_no_answer() {
        let mut main = MainFields::default();
        main.set(Field::Zip, "8010");
        main.set(Field::State, "Steiermark");
        let collaborators = Collaborators::default().with_postal_lookup(Arc::new(ViennaOnly));
        post_process(&mut main, "Acme", &[], &context(), &collaborators).unwrap();
        assert_eq!(main.get(Field::State), Some("Steiermark"));
    }

    #[test]
    fn test_zip_without_digits_is_removed() {
        let mut main = MainFields::default();
        main.set(Field::Zip, "Wien");
        post_process(&mut main, "Acme", &[], &context(), &Collaborators::default()).unwrap();
        assert!(!main.is_set(Field::Zip));
        assert_eq!(main.gender, None);
    }

    #[test]
    fn test_organization_falls_back_to_restored_anchor() {
        let entities = vec![
            ExtractedEntity::new(ORGANIZATION, "Müller Bau GmbH", 0),
            ExtractedEntity::new(ORGANIZATION, "Müller Bau Partner", 9),
        ];
        assert_eq!(restore_organization("Mueller Bau", &entities), "Müller Bau");
    }

    #[test]
    fn test_organization_fallback_keeps_plain_digraphs() {
        let entities = vec![ExtractedEntity::new(ORGANIZATION, "Quellenhof Müller KG", 2)];
        assert_eq!(restore_organization("Quelle Mueller", &entities), "Quelle Müller");
        assert_eq!(restore_organization("Mueller Bau", &[]), "Mueller Bau");
    }
}
