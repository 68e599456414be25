use crate::collaborators::Collaborators;
use crate::config::{
    CountrySettings, CountryTask, ExtractionConfig, NerRecognizer, RelevanceFilterKind, TaskSpec,
};
use crate::error::{ExtractionError, Result};
use crate::preprocessors::{ClassifierRelevanceFilter, DictionaryRelevanceFilter, RelevanceFilter};
use crate::types::{Document, ExtractedEntity};
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;
use tracing::{debug, info, warn};

use super::dedup::deduplicate;
use super::ner::{LocationTask, OrganizationTask, PersonTask};
use super::pattern::PatternTask;
use super::phone::PhoneTask;
use super::terms::{TermMatchMode, TermTask};

// Debug configuration for pipeline tracing
#[derive(Debug, Clone)]
pub struct DebugConfig {
    pub enabled: bool,
    pub filter_patterns: Vec<String>,
}

impl DebugConfig {
    pub fn new(enabled: bool, filter_patterns: Vec<String>) -> Self {
        Self {
            enabled,
            filter_patterns,
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            filter_patterns: Vec::new(),
        }
    }
}

/// Debug utility function to trace matches through the pipeline
pub fn debug_claimed_entities(
    task_name: &str,
    entities: &[ExtractedEntity],
    debug_config: &DebugConfig,
) {
    if !debug_config.enabled || debug_config.filter_patterns.is_empty() {
        return;
    }

    let matching: Vec<&ExtractedEntity> = entities
        .iter()
        .filter(|entity| {
            debug_config.filter_patterns.iter().any(|pattern| {
                // Try regex first, fall back to simple string contains
                if let Ok(regex) = Regex::new(pattern) {
                    regex.is_match(&entity.matched)
                } else {
                    entity.matched.contains(pattern.as_str())
                }
            })
        })
        .collect();

    for entity in matching {
        debug!(
            task = task_name,
            line = entity.line_index,
            entity_type = %entity.entity_type,
            matched = %entity.matched,
            "traced match"
        );
    }
}

// ===== TASK CONTRACT =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    PreProcessing,
    CountrySpecific,
    TermsStandalone,
    TermsArbitrary,
    Ner,
    Generic,
}

impl TaskSpec {
    pub fn kind(&self) -> TaskKind {
        match self {
            TaskSpec::PreProcessing { .. } => TaskKind::PreProcessing,
            TaskSpec::CountrySpecific { .. } => TaskKind::CountrySpecific,
            TaskSpec::TermsStandalone { .. } => TaskKind::TermsStandalone,
            TaskSpec::TermsArbitrary { .. } => TaskKind::TermsArbitrary,
            TaskSpec::Ner { .. } => TaskKind::Ner,
            TaskSpec::Generic { .. } => TaskKind::Generic,
        }
    }
}

/// Lines claimed by one task, each with the entities found on it.
///
/// A claimed line may carry no entity at all (the second half of a match
/// that spans a line break); it is still removed from the pool.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskMatches {
    by_line: BTreeMap<usize, Vec<ExtractedEntity>>,
}

impl TaskMatches {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn claim(&mut self, line_index: usize) {
        self.by_line.entry(line_index).or_default();
    }

    /// Record an entity and claim its line
    pub fn push(&mut self, entity: ExtractedEntity) {
        self.by_line.entry(entity.line_index).or_default().push(entity);
    }

    pub fn is_claimed(&self, line_index: usize) -> bool {
        self.by_line.contains_key(&line_index)
    }

    pub fn claimed_indices(&self) -> BTreeSet<usize> {
        self.by_line.keys().copied().collect()
    }

    /// Number of claimed lines
    pub fn len(&self) -> usize {
        self.by_line.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_line.is_empty()
    }

    pub fn into_entities(self) -> Vec<ExtractedEntity> {
        self.by_line.into_values().flatten().collect()
    }
}

/// Extraction task trait - claims lines from the snapshot it is handed
pub trait ExtractionTask: Send + Sync {
    /// Get task name for debugging/logging
    fn name(&self) -> &str;

    fn kind(&self) -> TaskKind;

    /// Inspect the snapshot and claim lines. Indices outside the snapshot
    /// are discarded by the pipeline.
    fn extract(&self, lines: &Document) -> Result<TaskMatches>;
}

/// One configured step: either a relevance filter that narrows the pool
/// or an extraction task that claims from it.
pub enum PipelineStage {
    PreProcessing(Box<dyn RelevanceFilter>),
    Extraction(Box<dyn ExtractionTask>),
}

impl PipelineStage {
    pub fn name(&self) -> &str {
        match self {
            PipelineStage::PreProcessing(filter) => filter.name(),
            PipelineStage::Extraction(task) => task.name(),
        }
    }

    pub fn kind(&self) -> TaskKind {
        match self {
            PipelineStage::PreProcessing(_) => TaskKind::PreProcessing,
            PipelineStage::Extraction(task) => task.kind(),
        }
    }
}

// ===== PIPELINE =====

#[derive(Debug, Clone, Serialize)]
pub struct TaskStats {
    pub name: String,
    pub kind: TaskKind,
    /// Lines removed from the pool by this stage
    pub removed_lines: usize,
    /// Entities emitted after deduplication
    pub entities: usize,
    pub remaining_lines: usize,
    pub elapsed_micros: u64,
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Cumulative entity stream, ordered by line index
    pub claimed: Vec<ExtractedEntity>,
    /// Lines no task claimed
    pub remaining: Document,
    pub task_stats: Vec<TaskStats>,
}

/// Runs the configured stages in order over shrinking snapshots of a document.
///
/// Every stage sees only the lines no earlier stage claimed or filtered out,
/// so each line index appears in the output of at most one task.
pub struct ExtractionPipeline {
    stages: Vec<PipelineStage>,
    debug_config: DebugConfig,
}

impl ExtractionPipeline {
    pub fn new(stages: Vec<PipelineStage>) -> Self {
        Self {
            stages,
            debug_config: DebugConfig::disabled(),
        }
    }

    pub fn from_settings(
        settings: &CountrySettings,
        config: &ExtractionConfig,
        collaborators: &Collaborators,
    ) -> Result<Self> {
        PipelineBuilder::new(settings, config, collaborators).build()
    }

    pub fn set_debug_config(&mut self, debug_config: DebugConfig) {
        self.debug_config = debug_config;
    }

    pub fn stages(&self) -> &[PipelineStage] {
        &self.stages
    }

    pub fn run(&self, lines: &Document) -> Result<PipelineOutput> {
        info!(
            stages = self.stages.len(),
            lines = lines.len(),
            "running extraction pipeline"
        );

        let mut remaining = lines.clone();
        let mut claimed: Vec<ExtractedEntity> = Vec::new();
        let mut task_stats = Vec::with_capacity(self.stages.len());

        for stage in &self.stages {
            let start = Instant::now();
            let before = remaining.len();
            debug!(task = stage.name(), lines = before, "stage started");

            let entity_count = match stage {
                PipelineStage::PreProcessing(filter) => {
                    remaining = apply_filter(filter.as_ref(), &remaining)?;
                    0
                }
                PipelineStage::Extraction(task) => {
                    let matches = task.extract(&remaining)?;

                    let (valid, stray): (BTreeSet<usize>, BTreeSet<usize>) = matches
                        .claimed_indices()
                        .into_iter()
                        .partition(|index| remaining.contains(*index));
                    if !stray.is_empty() {
                        warn!(task = task.name(), ?stray, "task claimed lines outside its snapshot");
                    }

                    let entities: Vec<ExtractedEntity> = matches
                        .into_entities()
                        .into_iter()
                        .filter(|entity| valid.contains(&entity.line_index))
                        .collect();
                    let entities = deduplicate(entities);
                    debug_claimed_entities(task.name(), &entities, &self.debug_config);

                    remaining = remaining.without(&valid);
                    let count = entities.len();
                    claimed.extend(entities);
                    count
                }
            };

            let stats = TaskStats {
                name: stage.name().to_string(),
                kind: stage.kind(),
                removed_lines: before - remaining.len(),
                entities: entity_count,
                remaining_lines: remaining.len(),
                elapsed_micros: start.elapsed().as_micros() as u64,
            };
            debug!(
                task = %stats.name,
                kind = ?stats.kind,
                removed = stats.removed_lines,
                entities = stats.entities,
                remaining = stats.remaining_lines,
                "stage finished"
            );
            task_stats.push(stats);
        }

        // Stable: entities on the same line keep task order
        claimed.sort_by_key(|entity| entity.line_index);

        info!(
            entities = claimed.len(),
            remaining = remaining.len(),
            "extraction pipeline finished"
        );

        Ok(PipelineOutput {
            claimed,
            remaining,
            task_stats,
        })
    }
}

fn apply_filter(filter: &dyn RelevanceFilter, lines: &Document) -> Result<Document> {
    let mut keep = BTreeSet::new();
    for (index, line) in lines.iter() {
        let relevant = filter
            .is_relevant(line)
            .map_err(|source| ExtractionError::Collaborator {
                task: filter.name().to_string(),
                source,
            })?;
        if relevant {
            keep.insert(index);
        }
    }
    Ok(lines.retain(&keep))
}

// ===== BUILDER =====

/// Turns task descriptors into runnable stages
pub struct PipelineBuilder<'a> {
    settings: &'a CountrySettings,
    config: &'a ExtractionConfig,
    collaborators: &'a Collaborators,
}

impl<'a> PipelineBuilder<'a> {
    pub fn new(
        settings: &'a CountrySettings,
        config: &'a ExtractionConfig,
        collaborators: &'a Collaborators,
    ) -> Self {
        Self {
            settings,
            config,
            collaborators,
        }
    }

    pub fn build(&self) -> Result<ExtractionPipeline> {
        let stages = self
            .settings
            .pipeline
            .iter()
            .map(|spec| self.build_stage(spec))
            .collect::<Result<Vec<_>>>()?;
        debug!(
            country_code = %self.settings.country_code,
            stages = stages.len(),
            "built extraction pipeline"
        );
        Ok(ExtractionPipeline::new(stages))
    }

    pub fn build_stage(&self, spec: &TaskSpec) -> Result<PipelineStage> {
        let stage = match spec {
            TaskSpec::PreProcessing { filter } => match filter {
                RelevanceFilterKind::Dictionary => PipelineStage::PreProcessing(Box::new(
                    DictionaryRelevanceFilter::new(&self.settings.avoid),
                )),
                RelevanceFilterKind::Classifier => {
                    let classifier = self.collaborators.line_classifier.clone().ok_or(
                        ExtractionError::MissingCollaborator {
                            task: "ClassifierRelevance".to_string(),
                            collaborator: "line classifier",
                        },
                    )?;
                    PipelineStage::PreProcessing(Box::new(ClassifierRelevanceFilter::new(
                        classifier,
                    )))
                }
            },
            TaskSpec::CountrySpecific {
                task: CountryTask::Phone,
            } => PipelineStage::Extraction(Box::new(PhoneTask::new(
                self.settings.phone_pattern.as_deref(),
                self.settings.calling_code.as_deref(),
            )?)),
            TaskSpec::TermsStandalone { entity_type } => {
                PipelineStage::Extraction(Box::new(TermTask::new(
                    entity_type,
                    &self.settings.terms.standalone,
                    TermMatchMode::Standalone,
                )))
            }
            TaskSpec::TermsArbitrary { entity_type } => {
                PipelineStage::Extraction(Box::new(TermTask::new(
                    entity_type,
                    &self.settings.terms.arbitrary_position,
                    TermMatchMode::ArbitraryPosition,
                )))
            }
            TaskSpec::Ner { recognizer } => self.build_ner(*recognizer)?,
            TaskSpec::Generic {
                name,
                entity_type,
                pattern,
                capture_group,
                continuation_keyword,
            } => PipelineStage::Extraction(Box::new(PatternTask::new(
                name,
                entity_type,
                pattern.as_deref(),
                *capture_group,
                continuation_keyword.as_deref(),
            )?)),
        };
        Ok(stage)
    }

    fn build_ner(&self, recognizer: NerRecognizer) -> Result<PipelineStage> {
        let task_name = match recognizer {
            NerRecognizer::Organization => "NerOrganization",
            NerRecognizer::Person => "NerPerson",
            NerRecognizer::Location => "NerLocation",
        };
        let missing = |collaborator: &'static str| ExtractionError::MissingCollaborator {
            task: task_name.to_string(),
            collaborator,
        };

        let ner = self
            .collaborators
            .recognizer
            .clone()
            .ok_or_else(|| missing("entity recognizer"))?;
        let min_confidence = self.config.min_confidence;

        let task: Box<dyn ExtractionTask> = match recognizer {
            NerRecognizer::Organization => Box::new(OrganizationTask::new(ner, min_confidence)),
            NerRecognizer::Person => {
                let parser = self
                    .collaborators
                    .name_parser
                    .clone()
                    .ok_or_else(|| missing("name parser"))?;
                Box::new(PersonTask::new(ner, parser, min_confidence))
            }
            NerRecognizer::Location => {
                let parser = self
                    .collaborators
                    .address_parser
                    .clone()
                    .ok_or_else(|| missing("address parser"))?;
                Box::new(LocationTask::new(ner, parser, min_confidence))
            }
        };
        Ok(PipelineStage::Extraction(task))
    }
}
