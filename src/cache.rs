use crate::entry::{normalize_key, Hit, Provenance};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A resolved lookup stored in the cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub title: Option<String>,
    pub scopus_id: Option<String>,
    pub doi: Option<String>,
    pub source: Provenance,
    pub cached_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CacheStats {
    pub total_entries: usize,
    pub path: PathBuf,
    pub file_exists: bool,
}

/// JSON file backed cache of resolved identifiers.
///
/// The whole map sits behind one lock and every write rewrites the file
/// before returning.
pub struct ResultCache {
    path: PathBuf,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl ResultCache {
    /// Open the cache at `path`. A missing or unreadable file starts an empty cache.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match load_entries(&path) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not load cache, starting empty");
                HashMap::new()
            }
        };
        debug!(path = %path.display(), entries = entries.len(), "cache loaded");

        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        self.lock().get(&normalize_key(key)).cloned()
    }

    /// Store a hit under `key`, stamping it with the current time
    pub fn set(&self, key: &str, hit: &Hit, source: Provenance) -> CacheEntry {
        let entry = CacheEntry {
            title: hit.title.clone(),
            scopus_id: hit.scopus_id.clone(),
            doi: hit.doi.clone(),
            source,
            cached_at: Utc::now(),
        };

        let mut entries = self.lock();
        entries.insert(normalize_key(key), entry.clone());
        self.persist(&entries);
        entry
    }

    pub fn clear(&self) {
        let mut entries = self.lock();
        entries.clear();
        self.persist(&entries);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let total_entries = self.len();
        CacheStats {
            total_entries,
            path: self.path.clone(),
            file_exists: self.path.exists(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn persist(&self, entries: &HashMap<String, CacheEntry>) {
        if let Err(e) = save_entries(&self.path, entries) {
            warn!(path = %self.path.display(), error = %e, "Could not save cache");
        }
    }
}

fn load_entries(path: &Path) -> Result<HashMap<String, CacheEntry>, CacheError> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn save_entries(path: &Path, entries: &HashMap<String, CacheEntry>) -> Result<(), CacheError> {
    let content = serde_json::to_string_pretty(entries)?;
    fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn hit() -> Hit {
        Hit {
            title: Some("A Great Paper".to_string()),
            scopus_id: Some("2-s2.0-85072210536".to_string()),
            doi: None,
        }
    }

    #[test]
    fn test_cache_round_trip() {
        let dir = tempdir().unwrap();
        let cache = ResultCache::open(dir.path().join("cache.json"));

        let before = Utc::now();
        cache.set("10.1016/J.SOFTX.2019.100263", &hit(), Provenance::Scopus);

        let entry = cache.get(" 10.1016/j.softx.2019.100263 ").unwrap();
        assert_eq!(entry.title.as_deref(), Some("A Great Paper"));
        assert_eq!(entry.scopus_id.as_deref(), Some("2-s2.0-85072210536"));
        assert_eq!(entry.source, Provenance::Scopus);
        assert!(entry.cached_at >= before);

        assert!(cache.get("10.1000/unknown").is_none());
    }

    #[test]
    fn set_is_on_disk_before_returning() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let cache = ResultCache::open(&path);

        cache.set("10.1000/abc", &hit(), Provenance::Scopus);

        let reopened = ResultCache::open(&path);
        assert_eq!(reopened.len(), 1);
        assert!(reopened.get("10.1000/ABC").is_some());
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, "{not json").unwrap();

        let cache = ResultCache::open(&path);
        assert!(cache.is_empty());
        assert!(cache.stats().file_exists);
    }

    #[test]
    fn clear_persists_empty_state() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let cache = ResultCache::open(&path);
        cache.set("10.1000/abc", &hit(), Provenance::Scopus);

        cache.clear();

        assert!(cache.is_empty());
        assert_eq!(fs::read_to_string(&path).unwrap().trim(), "{}");
    }

    #[test]
    fn save_failure_keeps_memory_authoritative() {
        let dir = tempdir().unwrap();
        let cache = ResultCache::open(dir.path().join("missing").join("cache.json"));

        cache.set("10.1000/abc", &hit(), Provenance::Scopus);

        assert!(cache.get("10.1000/abc").is_some());
        assert!(!cache.stats().file_exists);
    }
}
