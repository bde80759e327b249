pub mod cache;
pub mod checkpoint;
pub mod config;
pub mod credential;
pub mod entry;
pub mod interrupt;
pub mod lookup;
pub mod parser;
pub mod report;
pub mod stats;
pub mod validate;

use cache::ResultCache;
use checkpoint::{CheckpointMetadata, CheckpointStore};
use config::ExtractorConfig;
use entry::{ResultRecord, SearchMode};
use interrupt::{Cancelled, Interrupt};
use lookup::LookupClient;
use report::RunSummary;
use stats::RunStats;
use validate::{validate_batch, ValidationReport};

use chrono::Utc;
use colored::Colorize;
use futures::{stream, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum RunError {
    #[error("Input file {0} not found")]
    MissingInput(PathBuf),
    #[error("Failed to read input: {0}")]
    Io(#[from] std::io::Error),
}

impl From<parser::ParseError> for RunError {
    fn from(e: parser::ParseError) -> Self {
        match e {
            parser::ParseError::NotFound(path) => RunError::MissingInput(path),
            parser::ParseError::IoError(e) => RunError::Io(e),
        }
    }
}

/// Input after loading and validation, ready to be processed
#[derive(Debug, Clone)]
pub struct PreparedBatch {
    /// Number of non-blank input lines
    pub original_count: usize,
    pub validation: ValidationReport,
}

impl PreparedBatch {
    pub fn items(&self) -> &[String] {
        &self.validation.unique_items
    }
}

/// Drives a batch through validation, resume, lookup, checkpointing and output
pub struct BatchRunner {
    config: ExtractorConfig,
    cache: Arc<ResultCache>,
    checkpoints: CheckpointStore,
    stats: Arc<RunStats>,
    interrupt: Interrupt,
}

impl BatchRunner {
    pub fn new(
        config: ExtractorConfig,
        cache: Arc<ResultCache>,
        stats: Arc<RunStats>,
        interrupt: Interrupt,
    ) -> Self {
        let checkpoints = CheckpointStore::new(config.paths.checkpoint.clone());
        Self {
            config,
            cache,
            checkpoints,
            stats,
            interrupt,
        }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Load and validate the input file, writing a validation report when needed
    pub fn prepare(&self) -> Result<PreparedBatch, RunError> {
        let mode = self.config.mode;
        let input = self.config.paths.input_for(mode);
        let items = parser::load_items_from_file(input)?;
        info!(path = %input.display(), items = items.len(), "input loaded");
        println!("Loaded {} items", items.len());

        let validation = validate_batch(&items, mode);
        println!(
            "  Valid: {}/{}  Invalid: {}  Duplicates: {}",
            validation.valid,
            validation.total,
            validation.invalid(),
            validation.duplicates()
        );

        if validation.has_issues() {
            let path = &self.config.paths.validation_report;
            match report::write_validation_report(path, &validation, mode) {
                Ok(()) => println!("  Validation report saved to {}", path.display().to_string().cyan()),
                Err(e) => warn!(path = %path.display(), error = %e, "Could not save validation report"),
            }
        }
        if validation.invalid() > 0 {
            println!(
                "  {}",
                format!("{} invalid items will be skipped", validation.invalid()).yellow()
            );
        }
        // Duplicates are dropped either way; the flag only changes the message.
        if self.config.skip_duplicates && validation.duplicates() > 0 {
            println!(
                "  Using {} unique items (removed {} duplicates)",
                validation.unique(),
                validation.duplicates()
            );
        }

        Ok(PreparedBatch {
            original_count: items.len(),
            validation,
        })
    }

    /// Process the prepared items and write the results table
    pub async fn execute(&self, batch: &PreparedBatch, lookup: &LookupClient) -> RunSummary {
        let mode = self.config.mode;
        let (start_index, mut results) = self.restore();

        let pending: Vec<String> = batch
            .items()
            .iter()
            .skip(start_index)
            .take(self.config.limit.filter(|&n| n > 0).unwrap_or(usize::MAX))
            .cloned()
            .collect();

        let mut interrupted = false;
        if pending.is_empty() {
            println!("No items to process");
        } else {
            println!("Processing {} items...", pending.len());
            interrupted = self
                .process(&pending, start_index, batch.original_count, lookup, &mut results)
                .await;
        }

        self.finalize(&results, interrupted, mode)
    }

    /// Resume offset and previously accumulated results
    fn restore(&self) -> (usize, Vec<ResultRecord>) {
        if !self.config.resume {
            return (0, Vec::new());
        }
        match self.checkpoints.load() {
            Some(state) if state.metadata.search_mode == self.config.mode => {
                let start = state.metadata.last_processed_index;
                info!(start, results = state.results.len(), "resuming from checkpoint");
                println!("Resuming from checkpoint: {} items already processed", start);
                (start, state.results)
            }
            Some(state) => {
                warn!(
                    checkpoint_mode = %state.metadata.search_mode,
                    mode = %self.config.mode,
                    "Ignoring checkpoint from a different search mode"
                );
                (0, Vec::new())
            }
            None => {
                debug!("no checkpoint to resume from");
                (0, Vec::new())
            }
        }
    }

    /// Returns true when the run was interrupted
    async fn process(
        &self,
        pending: &[String],
        start_index: usize,
        original_count: usize,
        lookup: &LookupClient,
        results: &mut Vec<ResultRecord>,
    ) -> bool {
        let workers = self.config.workers.max(1);
        let interval = self.config.checkpoint_interval.max(1);

        let pb = ProgressBar::new(pending.len() as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }

        // `buffered` yields in input order, so results always form a contiguous prefix.
        let mut outcomes = stream::iter(pending)
            .map(|item| async move { (item, self.resolve_item(item, lookup).await) })
            .buffered(workers);

        let mut processed = 0;
        let mut interrupted = false;

        while let Some((item, outcome)) = outcomes.next().await {
            let record = match outcome {
                Ok(record) => record,
                Err(Cancelled) => {
                    interrupted = true;
                    break;
                }
            };

            processed += 1;
            let absolute_index = start_index + processed;
            pb.println(format_record(absolute_index, original_count, item, &record));
            results.push(record);
            pb.inc(1);

            if processed % interval == 0 {
                self.save_checkpoint(original_count, absolute_index, results);
                let found = results.iter().filter(|r| r.is_found()).count();
                pb.println(format!(
                    "    Checkpoint: {}/{} | Found: {}/{}",
                    absolute_index,
                    original_count,
                    found,
                    results.len()
                ));
            }
        }
        drop(outcomes);

        if interrupted {
            pb.abandon_with_message("Interrupted");
            println!("{}", "INTERRUPTED".yellow().bold());
            self.save_checkpoint(original_count, start_index + processed, results);
        } else {
            pb.finish_with_message("Done!");
        }
        interrupted
    }

    /// Cache read-through lookup for one item
    async fn resolve_item(&self, item: &str, lookup: &LookupClient) -> Result<ResultRecord, Cancelled> {
        self.interrupt.check()?;
        let mode = self.config.mode;

        if self.config.use_cache {
            if let Some(cached) = self.cache.get(item) {
                self.stats.record_cache_hit();
                debug!(item, "cache hit");
                return Ok(ResultRecord {
                    query: item.to_string(),
                    title: cached.title,
                    scopus_id: cached.scopus_id,
                    doi: if mode == SearchMode::Title { cached.doi } else { None },
                });
            }
        }

        let resolution = lookup.resolve(item, mode).await?;

        if self.config.use_cache && resolution.has_scopus_id() {
            if let Some(source) = resolution.source {
                self.cache.set(item, &resolution.hit, source);
            }
        }

        Ok(ResultRecord {
            query: item.to_string(),
            title: resolution.hit.title,
            scopus_id: resolution.hit.scopus_id,
            doi: resolution.hit.doi,
        })
    }

    fn save_checkpoint(&self, total_items: usize, last_processed_index: usize, results: &[ResultRecord]) {
        let metadata = CheckpointMetadata {
            search_mode: self.config.mode,
            total_items,
            last_processed_index,
            timestamp: Utc::now(),
        };
        self.checkpoints.save(metadata, results);
    }

    fn finalize(&self, results: &[ResultRecord], interrupted: bool, mode: SearchMode) -> RunSummary {
        if !results.is_empty() {
            let path = &self.config.paths.output;
            match report::write_results(path, mode, results) {
                Ok(()) => println!("Results saved to {}", path.display().to_string().cyan()),
                Err(e) => warn!(path = %path.display(), error = %e, "Could not save results"),
            }
        }
        RunSummary::new(mode, results, &self.stats, interrupted)
    }
}

fn format_record(index: usize, total: usize, item: &str, record: &ResultRecord) -> String {
    let mut line = format!("[{}/{}] {}", index, total, report::truncate(item, 80));
    match &record.scopus_id {
        Some(id) => line.push_str(&format!("\n    {} {}", "Scopus ID:".green(), id)),
        None => line.push_str(&format!("\n    {}", "Scopus ID not found".yellow())),
    }
    if let Some(title) = &record.title {
        line.push_str(&format!("\n    Title: {}", report::truncate(title, 100)));
    }
    if let Some(doi) = &record.doi {
        line.push_str(&format!("\n    DOI: {}", doi));
    }
    line
}
