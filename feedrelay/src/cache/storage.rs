//! Durable storage tier: one JSON file per cache entry.

use crate::cache::r#trait::EntryStore;
use crate::cache::types::{CacheEntry, CacheError};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
struct IndexEntry {
    path: PathBuf,
    stored_at: u64,
}

/// Directory-backed entry store.
///
/// Each entry is written to `<dir>/<prefix><sha256(key)>.json`. The
/// directory is scanned on open to rebuild the in-memory index, so entries
/// survive a restart of the process.
pub struct StorageTier {
    dir: PathBuf,
    prefix: String,
    index: Mutex<HashMap<String, IndexEntry>>,
    max_entries: usize,
}

impl StorageTier {
    /// Open (creating if needed) a storage tier rooted at `dir`.
    pub fn open(
        dir: impl Into<PathBuf>,
        prefix: impl Into<String>,
        max_entries: usize,
    ) -> Result<Self, CacheError> {
        let dir = dir.into();
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }

        let tier = Self {
            dir,
            prefix: prefix.into(),
            index: Mutex::new(HashMap::new()),
            max_entries: max_entries.max(1),
        };

        tier.scan_dir()?;

        let evicted = {
            let mut index = tier.index.lock().unwrap();
            tier.evict_oldest(&mut index)
        };
        if evicted > 0 {
            debug!(evicted, dir = %tier.dir.display(), "Trimmed storage tier on open");
        }

        Ok(tier)
    }

    /// Root directory of the tier.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.dir
            .join(format!("{}{:x}.json", self.prefix, digest))
    }

    fn is_entry_file(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        name.starts_with(&self.prefix) && name.ends_with(".json")
    }

    /// Scan the directory to build the index.
    ///
    /// Files that do not decode are removed.
    fn scan_dir(&self) -> Result<(), CacheError> {
        let mut index = self.index.lock().unwrap();

        for dir_entry in fs::read_dir(&self.dir)? {
            let path = dir_entry?.path();
            if !path.is_file() || !self.is_entry_file(&path) {
                continue;
            }

            match read_entry(&path) {
                Ok(entry) => {
                    index.insert(
                        entry.key.clone(),
                        IndexEntry {
                            path,
                            stored_at: entry.stored_at,
                        },
                    );
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Discarding unreadable cache file");
                    let _ = fs::remove_file(&path);
                }
            }
        }

        debug!(entries = index.len(), dir = %self.dir.display(), "Storage tier index rebuilt");
        Ok(())
    }

    fn evict_oldest(&self, index: &mut HashMap<String, IndexEntry>) -> usize {
        if index.len() <= self.max_entries {
            return 0;
        }

        let excess = index.len() - self.max_entries;
        let mut by_age: Vec<(u64, String)> = index
            .iter()
            .map(|(k, v)| (v.stored_at, k.clone()))
            .collect();
        by_age.sort();

        for (_, key) in by_age.into_iter().take(excess) {
            if let Some(removed) = index.remove(&key) {
                let _ = fs::remove_file(&removed.path);
            }
        }
        excess
    }
}

fn read_entry(path: &Path) -> Result<CacheEntry, CacheError> {
    let bytes = fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

impl EntryStore for StorageTier {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let path = {
            let index = self.index.lock().unwrap();
            match index.get(key) {
                Some(item) => item.path.clone(),
                None => return Ok(None),
            }
        };

        match read_entry(&path) {
            Ok(entry) if entry.key == key => Ok(Some(entry)),
            Ok(_) => Ok(None),
            Err(e) => {
                // File vanished or is corrupt - drop it from the index
                self.index.lock().unwrap().remove(key);
                Err(e)
            }
        }
    }

    fn put(&self, entry: &CacheEntry) -> Result<usize, CacheError> {
        let path = self.path_for(&entry.key);
        let encoded = serde_json::to_vec(entry)?;
        fs::write(&path, encoded)?;

        let mut index = self.index.lock().unwrap();
        index.insert(
            entry.key.clone(),
            IndexEntry {
                path,
                stored_at: entry.stored_at,
            },
        );
        Ok(self.evict_oldest(&mut index))
    }

    fn remove_matching(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        let mut index = self.index.lock().unwrap();
        let matched: Vec<String> = index
            .keys()
            .filter(|key| key.contains(pattern))
            .cloned()
            .collect();

        for key in &matched {
            if let Some(item) = index.remove(key) {
                if let Err(e) = fs::remove_file(&item.path) {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        return Err(e.into());
                    }
                }
            }
        }
        Ok(matched)
    }

    fn len(&self) -> usize {
        self.index.lock().unwrap().len()
    }

    fn name(&self) -> &str {
        "storage"
    }
}
