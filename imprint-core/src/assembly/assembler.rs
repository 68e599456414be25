use super::similarity::{basename, fold_diacritics, token_set_ratio};
use crate::config::AssemblyConfig;
use crate::error::{ExtractionError, Result};
use crate::types::{ContactRecord, ExtractedEntity, Field};
use tracing::{debug, trace};

/// Composite values collected for one field tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingField {
    pub tag: String,
    pub matches: Vec<String>,
    pub entities: Vec<ExtractedEntity>,
}

impl PendingField {
    fn start(tag: &str, entity: &ExtractedEntity) -> Self {
        Self {
            tag: tag.to_string(),
            matches: vec![entity.matched.clone()],
            entities: vec![entity.clone()],
        }
    }

    fn push(&mut self, entity: &ExtractedEntity) {
        self.matches.push(entity.matched.clone());
        self.entities.push(entity.clone());
    }

    /// Write the joined value into `main` when the field is free, otherwise
    /// keep the parts as secondary entities.
    fn flush(self, record: &mut ContactRecord) {
        let value = self.matches.join(" ");
        match self.tag.parse::<Field>() {
            Ok(field) if !record.main.is_set(field) => {
                trace!(field = %field, value = %value, "composite field assembled");
                record.main.set(field, value);
            }
            _ => record.secondary.extend(self.entities),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssemblyState {
    /// Inside the anchor organization's block
    Normal,
    /// Collecting consecutive parts of one composite field
    Accumulating(PendingField),
    /// Inside the block of a different organization
    Misleading,
}

/// Folds the index-ordered entity stream into a contact record.
///
/// ```text
///             org ≥ cutoff / field                 org < cutoff
///   Normal ─────────────────────────► Normal ─────────────────────► Misleading
///     │  composite                        ▲                            │
///     ▼                                   │ org / simple / other tag   │ org ≥ cutoff
///   Accumulating(tag) ──── flush ─────────┘                            ▼
///                                                                    Normal
/// ```
///
/// Organization mentions are compared with the anchor on their basenames.
pub struct BlockAssembler {
    anchor_basename: String,
    config: AssemblyConfig,
}

impl BlockAssembler {
    pub fn new(anchor: &str, config: AssemblyConfig) -> Self {
        Self {
            anchor_basename: basename(anchor, &config.legal_forms),
            config,
        }
    }

    /// Token-set similarity of an organization mention to the anchor
    pub fn similarity(&self, organization: &str) -> u8 {
        let candidate = basename(&fold_diacritics(organization.trim()), &self.config.legal_forms);
        token_set_ratio(&candidate, &self.anchor_basename)
    }

    fn belongs_to_anchor(&self, organization: &ExtractedEntity) -> bool {
        self.similarity(&organization.matched) >= self.config.similarity_cutoff
    }

    pub fn assemble(&self, entities: &[ExtractedEntity]) -> Result<ContactRecord> {
        if !entities.iter().any(ExtractedEntity::is_organization) {
            return Err(ExtractionError::NoOrganizationFound);
        }

        let mut record = ContactRecord::default();
        let mut state = AssemblyState::Normal;
        for entity in entities {
            state = self.step(state, entity, &mut record);
        }
        if let AssemblyState::Accumulating(pending) = state {
            pending.flush(&mut record);
        }

        debug!(
            main = record.main.iter().count(),
            secondary = record.secondary.len(),
            misleading = record.misleading.len(),
            "assembled contact record"
        );
        Ok(record)
    }

    /// One transition of the assembly automaton
    pub fn step(
        &self,
        state: AssemblyState,
        entity: &ExtractedEntity,
        record: &mut ContactRecord,
    ) -> AssemblyState {
        if let AssemblyState::Misleading = state {
            if entity.is_organization() && self.belongs_to_anchor(entity) {
                record.secondary.push(entity.clone());
                return AssemblyState::Normal;
            }
            record.misleading.push(entity.clone());
            return AssemblyState::Misleading;
        }

        if entity.is_organization() {
            if let AssemblyState::Accumulating(pending) = state {
                pending.flush(record);
            }
            if self.belongs_to_anchor(entity) {
                record.secondary.push(entity.clone());
                return AssemblyState::Normal;
            }
            debug!(organization = %entity.matched, line = entity.line_index, "entering foreign block");
            record.misleading.push(entity.clone());
            return AssemblyState::Misleading;
        }

        match entity.composite_tag() {
            Some(tag) => match state {
                AssemblyState::Accumulating(mut pending) if pending.tag == tag => {
                    pending.push(entity);
                    AssemblyState::Accumulating(pending)
                }
                AssemblyState::Accumulating(pending) => {
                    pending.flush(record);
                    AssemblyState::Accumulating(PendingField::start(tag, entity))
                }
                _ => AssemblyState::Accumulating(PendingField::start(tag, entity)),
            },
            None => {
                if let AssemblyState::Accumulating(pending) = state {
                    pending.flush(record);
                }
                place_simple(entity, record);
                AssemblyState::Normal
            }
        }
    }
}

/// First wins into `main`; later values and unknown types go to `secondary`
fn place_simple(entity: &ExtractedEntity, record: &mut ContactRecord) {
    let placed = match entity.entity_type.parse::<Field>() {
        Ok(field) => record.main.set_if_empty(field, entity.matched.clone()),
        Err(_) => false,
    };
    if !placed {
        record.secondary.push(entity.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(entity_type: &str, matched: &str, line_index: usize) -> ExtractedEntity {
        ExtractedEntity::new(entity_type, matched, line_index)
    }

    fn assembler() -> BlockAssembler {
        BlockAssembler::new("Acme GmbH", AssemblyConfig::default())
    }

    #[test]
    fn test_first_email_wins() {
        let record = assembler()
            .assemble(&[
                entity("organization", "Acme GmbH", 0),
                entity("email", "a@x.com", 1),
                entity("email", "b@y.com", 2),
            ])
            .unwrap();
        assert_eq!(record.main.get(Field::Email), Some("a@x.com"));
        assert!(record.secondary.contains(&entity("email", "b@y.com", 2)));
    }

    #[test]
    fn test_composite_parts_are_joined() {
        let record = assembler()
            .assemble(&[
                entity("organization", "Acme GmbH", 0),
                entity("firstName_given_name", "Maria", 1),
                entity("firstName_middle_name", "Elena", 1),
                entity("lastName", "Huber", 1),
            ])
            .unwrap();
        assert_eq!(record.main.get(Field::FirstName), Some("Maria Elena"));
        assert_eq!(record.main.get(Field::LastName), Some("Huber"));
    }

    #[test]
    fn test_second_composite_block_goes_to_secondary() {
        let record = assembler()
            .assemble(&[
                entity("organization", "Acme GmbH", 0),
                entity("street_road", "Hauptstraße", 1),
                entity("street_house_number", "1", 1),
                entity("zip", "1010", 1),
                entity("street_road", "Nebengasse", 2),
            ])
            .unwrap();
        assert_eq!(record.main.get(Field::Street), Some("Hauptstraße 1"));
        assert_eq!(record.secondary, vec![
            entity("organization", "Acme GmbH", 0),
            entity("street_road", "Nebengasse", 2),
        ]);
    }

    #[test]
    fn test_pending_field_flushed_at_end() {
        let record = assembler()
            .assemble(&[
                entity("organization", "Acme GmbH", 0),
                entity("city_city", "Wien", 3),
            ])
            .unwrap();
        assert_eq!(record.main.get(Field::City), Some("Wien"));
    }

    #[test]
    fn test_foreign_organization_block_is_misleading() {
        let record = assembler()
            .assemble(&[
                entity("organization", "Acme GmbH", 0),
                entity("email", "office@acme.at", 1),
                entity("organization", "Webagentur Beta", 5),
                entity("email", "hello@beta.at", 6),
                entity("organization", "ACME", 9),
                entity("phone", "+4312345678", 10),
            ])
            .unwrap();
        assert_eq!(record.main.get(Field::Email), Some("office@acme.at"));
        assert_eq!(record.main.get(Field::Phone), Some("+4312345678"));
        assert_eq!(record.misleading, vec![
            entity("organization", "Webagentur Beta", 5),
            entity("email", "hello@beta.at", 6),
        ]);
        assert!(record.secondary.contains(&entity("organization", "ACME", 9)));
    }

    #[test]
    fn test_organization_flushes_pending_before_misleading() {
        let record = assembler()
            .assemble(&[
                entity("organization", "Acme GmbH", 0),
                entity("city_city", "Wien", 1),
                entity("organization", "Webagentur Beta", 2),
                entity("city_city", "Graz", 3),
            ])
            .unwrap();
        assert_eq!(record.main.get(Field::City), Some("Wien"));
        assert_eq!(record.misleading.len(), 2);
    }

    #[test]
    fn test_unknown_types_go_to_secondary() {
        let record = assembler()
            .assemble(&[
                entity("organization", "Acme GmbH", 0),
                entity("iban", "AT61 1904 3002 3457 3201", 4),
                entity("bankData_account", "x", 5),
            ])
            .unwrap();
        assert_eq!(record.main.iter().count(), 0);
        assert_eq!(record.secondary.len(), 3);
    }

    #[test]
    fn test_no_organization() {
        assert!(matches!(
            assembler().assemble(&[entity("email", "a@x.com", 0)]),
            Err(ExtractionError::NoOrganizationFound)
        ));
    }

    #[test]
    fn test_similarity_ignores_legal_forms() {
        assert_eq!(assembler().similarity("ACME AG"), 100);
        assert!(assembler().similarity("Webagentur Beta") < 70);
    }
}
