use crate::assembly::assemble_record;
use crate::collaborators::Collaborators;
use crate::config::{calculate_config_hash, ConfigManager, ExtractionConfig};
use crate::error::Result;
use crate::tasks::{DebugConfig, ExtractionPipeline, TaskStats};
use crate::types::{ContactRecord, CrawlContext, Document, ExtractedEntity, Line};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::time::{Duration, Instant};
use tracing::{debug, info};
use uuid::Uuid;

/// Simple profiler that collects timings for processing steps
pub struct StepProfiler {
    enabled: bool,
    timings: Vec<(String, Duration)>,
}

impl StepProfiler {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            timings: Vec::new(),
        }
    }

    pub fn time_step<F, R>(&mut self, step_name: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        if !self.enabled {
            return f();
        }

        let start = Instant::now();
        let result = f();
        let elapsed = start.elapsed();

        debug!(step = step_name, elapsed_ms = elapsed.as_millis() as u64, "step finished");
        self.timings.push((step_name.to_string(), elapsed));

        result
    }

    pub fn timings(&self) -> &[(String, Duration)] {
        &self.timings
    }

    pub fn log_summary(&self) {
        if !self.enabled || self.timings.is_empty() {
            return;
        }

        let total: Duration = self.timings.iter().map(|(_, d)| *d).sum();
        for (step, duration) in &self.timings {
            let percentage = if total.is_zero() {
                0.0
            } else {
                (duration.as_secs_f64() / total.as_secs_f64()) * 100.0
            };
            info!(
                step = %step,
                elapsed_ms = duration.as_millis() as u64,
                share = %format!("{percentage:.1}%"),
                "profile"
            );
        }
        info!(total_ms = total.as_millis() as u64, "profile total");
    }
}

/// Everything one extraction run produced, for callers and diagnostics
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionReport {
    pub run_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub country_code: String,
    /// Fingerprint of the country settings the pipeline was built from
    pub config_hash: String,
    /// Fingerprint of the input lines
    pub document_hash: String,
    /// Normalized organization name the record is anchored on
    pub anchor: String,
    pub task_stats: Vec<TaskStats>,
    /// The cumulative entity stream in line order
    pub entities: Vec<ExtractedEntity>,
    /// Lines no task claimed
    pub unclaimed: Vec<Line>,
    pub record: ContactRecord,
}

/// Stable fingerprint of a document's numbered lines
pub fn calculate_document_hash(document: &Document) -> String {
    let mut hasher = Sha256::new();
    for (index, text) in document.iter() {
        hasher.update(index.to_le_bytes());
        hasher.update(text.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

/// Imprint text + crawl context → contact record
pub struct ContactDataProcessor {
    config_manager: ConfigManager,
    config: ExtractionConfig,
    collaborators: Collaborators,
    debug_config: DebugConfig,
    profiling: bool,
}

impl ContactDataProcessor {
    pub fn new(collaborators: Collaborators) -> Self {
        Self::new_with_config(ConfigManager::new(), ExtractionConfig::default(), collaborators)
    }

    /// Create a processor with full dependency injection
    pub fn new_with_config(
        config_manager: ConfigManager,
        config: ExtractionConfig,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            config_manager,
            config,
            collaborators,
            debug_config: DebugConfig::disabled(),
            profiling: false,
        }
    }

    pub fn set_debug_config(&mut self, debug_config: DebugConfig) {
        self.debug_config = debug_config;
    }

    pub fn set_profiling(&mut self, enabled: bool) {
        self.profiling = enabled;
    }

    pub fn config_manager(&self) -> &ConfigManager {
        &self.config_manager
    }

    pub fn config_manager_mut(&mut self) -> &mut ConfigManager {
        &mut self.config_manager
    }

    pub fn load_custom_settings(&mut self, path: &str) -> Result<()> {
        info!(path, "loading custom country settings");
        self.config_manager.load_settings_from_file(path)
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Replace the country independent settings with the ones in a YAML file
    pub fn load_custom_config(&mut self, path: &str) -> Result<()> {
        info!(path, "loading custom extraction config");
        self.config = ExtractionConfig::load_from_file(path)?;
        Ok(())
    }

    /// Split plain imprint text into lines and process them
    pub fn process(&self, text: &str, context: &CrawlContext) -> Result<ExtractionReport> {
        self.process_document(&Document::from_text(text), context)
    }

    pub fn process_document(
        &self,
        document: &Document,
        context: &CrawlContext,
    ) -> Result<ExtractionReport> {
        let start_time = Instant::now();
        let mut profiler = StepProfiler::new(self.profiling);

        let settings = self.config_manager.get_settings(&context.country_code)?;
        let config_hash = calculate_config_hash(settings)?;
        let document_hash = calculate_document_hash(document);
        info!(
            country_code = %settings.country_code,
            lines = document.len(),
            document_hash = %document_hash,
            "processing imprint"
        );

        let mut pipeline = profiler.time_step("1. Pipeline Construction", || {
            ExtractionPipeline::from_settings(settings, &self.config, &self.collaborators)
        })?;
        pipeline.set_debug_config(self.debug_config.clone());

        let output = profiler.time_step("2. Extraction", || pipeline.run(document))?;

        let outcome = profiler.time_step("3. Block Assembly", || {
            assemble_record(&output.claimed, context, &self.config.assembly, &self.collaborators)
        })?;

        profiler.log_summary();
        info!(
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            entities = output.claimed.len(),
            "imprint processed"
        );

        Ok(ExtractionReport {
            run_id: Uuid::new_v4(),
            created_at: Utc::now(),
            country_code: settings.country_code.clone(),
            config_hash,
            document_hash,
            anchor: outcome.anchor,
            task_stats: output.task_stats,
            entities: output.claimed,
            unclaimed: output.remaining.to_lines(),
            record: outcome.record,
        })
    }
}
