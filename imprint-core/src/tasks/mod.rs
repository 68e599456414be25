// Extraction tasks module - one file per task family
// This file coordinates the task system but actual implementations are in:
// - engine.rs: ExtractionPipeline, PipelineBuilder and the task contract
// - dedup.rs: keep-last deduplication of a task's output
// - pattern.rs: generic regex tasks (email, website, iban, vat, ...)
// - phone.rs: country specific phone/mobile/fax extraction
// - terms.rs: standalone and arbitrary-position term matching
// - ner.rs: organization, person and location recognition

pub mod dedup;
pub mod engine;
pub mod ner;
pub mod pattern;
pub mod phone;
pub mod terms;

pub use dedup::deduplicate;
pub use engine::*;
pub use ner::{LocationTask, OrganizationTask, PersonTask};
pub use pattern::PatternTask;
pub use phone::PhoneTask;
pub use terms::{contains_complete_content, is_standalone, TermMatchMode, TermTask};
