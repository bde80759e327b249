use crate::entry::SearchMode;
use std::path::{Path, PathBuf};

pub const DOI_INPUT_FILE: &str = "dois.txt";
pub const TITLE_INPUT_FILE: &str = "titles.txt";
pub const OUTPUT_FILE: &str = "scopus_results.csv";
pub const CHECKPOINT_FILE: &str = "checkpoint.json";
pub const CACHE_FILE: &str = ".scopus_cache.json";
pub const API_KEY_FILE: &str = ".scopus_api_key";
pub const VALIDATION_REPORT_FILE: &str = "validation_report.txt";

/// Default number of concurrent lookups
pub const DEFAULT_WORKERS: usize = 3;

/// Checkpoint after this many processed items
pub const CHECKPOINT_INTERVAL: usize = 10;

/// Locations of every file the tool reads or writes
#[derive(Debug, Clone)]
pub struct Paths {
    pub doi_input: PathBuf,
    pub title_input: PathBuf,
    pub output: PathBuf,
    pub checkpoint: PathBuf,
    pub cache: PathBuf,
    pub api_key: PathBuf,
    pub validation_report: PathBuf,
}

impl Paths {
    /// Standard file names inside `dir`
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            doi_input: dir.join(DOI_INPUT_FILE),
            title_input: dir.join(TITLE_INPUT_FILE),
            output: dir.join(OUTPUT_FILE),
            checkpoint: dir.join(CHECKPOINT_FILE),
            cache: dir.join(CACHE_FILE),
            api_key: dir.join(API_KEY_FILE),
            validation_report: dir.join(VALIDATION_REPORT_FILE),
        }
    }

    pub fn input_for(&self, mode: SearchMode) -> &Path {
        match mode {
            SearchMode::Doi => &self.doi_input,
            SearchMode::Title => &self.title_input,
        }
    }
}

/// Settings for one batch run
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub mode: SearchMode,
    pub paths: Paths,
    pub limit: Option<usize>,
    pub workers: usize,
    pub resume: bool,
    pub skip_duplicates: bool,
    pub use_cache: bool,
    pub dry_run: bool,
    pub checkpoint_interval: usize,
}

impl ExtractorConfig {
    pub fn new(mode: SearchMode, paths: Paths) -> Self {
        Self {
            mode,
            paths,
            limit: None,
            workers: DEFAULT_WORKERS,
            resume: false,
            skip_duplicates: false,
            use_cache: true,
            dry_run: false,
            checkpoint_interval: CHECKPOINT_INTERVAL,
        }
    }
}
