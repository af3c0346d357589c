use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::CacheError;
use super::store::ElementStore;
use super::types::ElementSet;

#[derive(Debug, Serialize, Deserialize)]
struct CachedSet {
    name: String,
    line1: String,
    line2: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    refreshed: DateTime<Utc>,
    sets: Vec<CachedSet>,
}

/// On-disk element cache: one JSON file per collection, read on startup and
/// rewritten after each successful refresh. A missing file is an empty,
/// maximally-stale collection.
pub struct CacheDir {
    dir: PathBuf,
}

impl CacheDir {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path(&self, collection: &str) -> PathBuf {
        self.dir.join(format!("{}.json", collection))
    }

    /// Load every cached collection into the store, restoring the refreshed
    /// instant recorded at save time. Returns the number of collections
    /// loaded; unreadable files are logged and skipped.
    pub fn load_all(&self, store: &ElementStore) -> Result<usize, CacheError> {
        if !self.dir.exists() {
            return Ok(0);
        }

        let mut loaded = 0;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() || path.extension().map_or(true, |ext| ext != "json") {
                continue;
            }

            let collection = match path.file_stem().and_then(|s| s.to_str()) {
                Some(name) => name.to_string(),
                None => continue,
            };

            match self.load(&collection) {
                Ok(Some((refreshed, sets))) => {
                    log::info!(
                        "Loaded {} cached element sets for {} (refreshed {})",
                        sets.len(),
                        collection,
                        refreshed
                    );
                    store.put_refreshed(&collection, sets, refreshed);
                    loaded += 1;
                }
                Ok(None) => {}
                Err(e) => {
                    log::warn!("Failed to load cache file {}: {}", path.display(), e);
                }
            }
        }

        Ok(loaded)
    }

    pub fn load(
        &self,
        collection: &str,
    ) -> Result<Option<(DateTime<Utc>, Vec<ElementSet>)>, CacheError> {
        let path = self.path(collection);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)?;
        let file: CacheFile = serde_json::from_str(&content)?;

        let mut sets = Vec::with_capacity(file.sets.len());
        for cached in file.sets {
            match ElementSet::from_tle(Some(cached.name), &cached.line1, &cached.line2) {
                Ok(set) => sets.push(set),
                Err(e) => log::warn!("Skipping cached element set in {}: {}", collection, e),
            }
        }

        Ok(Some((file.refreshed, sets)))
    }

    pub fn save(
        &self,
        collection: &str,
        refreshed: DateTime<Utc>,
        sets: &[Arc<ElementSet>],
    ) -> Result<(), CacheError> {
        fs::create_dir_all(&self.dir)?;

        let file = CacheFile {
            refreshed,
            sets: sets
                .iter()
                .map(|s| CachedSet {
                    name: s.name.clone(),
                    line1: s.line1.clone(),
                    line2: s.line2.clone(),
                })
                .collect(),
        };

        let content = serde_json::to_string_pretty(&file)?;
        fs::write(self.path(collection), content)?;
        Ok(())
    }
}
