use crate::entry::{ResultRecord, SearchMode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    pub search_mode: SearchMode,
    pub total_items: usize,
    /// Number of unique items already processed, counted from the start of the input
    pub last_processed_index: usize,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointState {
    pub metadata: CheckpointMetadata,
    pub results: Vec<ResultRecord>,
}

/// Single-file progress snapshot; each save replaces the previous one
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the snapshot, logging instead of failing
    pub fn save(&self, metadata: CheckpointMetadata, results: &[ResultRecord]) {
        match self.try_save(metadata, results) {
            Ok(()) => debug!(path = %self.path.display(), results = results.len(), "checkpoint saved"),
            Err(e) => warn!(path = %self.path.display(), error = %e, "Could not save checkpoint"),
        }
    }

    /// Last saved snapshot, if there is a readable one
    pub fn load(&self) -> Option<CheckpointState> {
        if !self.path.exists() {
            return None;
        }
        match self.try_load() {
            Ok(state) => Some(state),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Could not load checkpoint");
                None
            }
        }
    }

    fn try_save(
        &self,
        metadata: CheckpointMetadata,
        results: &[ResultRecord],
    ) -> Result<(), CheckpointError> {
        let state = CheckpointState {
            metadata,
            results: results.to_vec(),
        };
        fs::write(&self.path, serde_json::to_string_pretty(&state)?)?;
        Ok(())
    }

    fn try_load(&self) -> Result<CheckpointState, CheckpointError> {
        let content = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }
}
