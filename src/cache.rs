use crate::errors::FiscalError;
use std::collections::HashMap;
use std::fs::File;
use std::hash::Hash;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::debug;

/// Identifies the content of a source file at one point in time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fingerprint {
    pub modified: Option<SystemTime>,
    pub sha256: [u8; 32],
}

impl Fingerprint {
    /// Fingerprints the file at `path` by modification time and SHA-256 of
    /// its contents.
    pub fn of(path: &Path) -> Result<Self, FiscalError> {
        use sha2::{Digest, Sha256};

        let mut file = File::open(path).map_err(|_| FiscalError::SourceNotFound {
            path: path.to_path_buf(),
        })?;
        let modified = file.metadata().and_then(|m| m.modified()).ok();

        let mut hasher = Sha256::new();
        let mut buffer = vec![0; 8192];
        loop {
            let n = file.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }

        Ok(Self {
            modified,
            sha256: hasher.finalize().into(),
        })
    }
}

struct CacheEntry<V> {
    fingerprints: Vec<(PathBuf, Fingerprint)>,
    value: Arc<V>,
}

/// Memoizes values computed from source files.
///
/// An entry is keyed by `K` and stays valid for as long as every source file
/// it was built from keeps the same [`Fingerprint`]. Entries never expire on
/// their own.
pub struct SourceCache<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    hits: u64,
    misses: u64,
}

impl<K, V> Default for SourceCache<K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }
}

impl<K: Hash + Eq + Clone, V> SourceCache<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached value for `key` if none of `sources` changed since
    /// it was computed, otherwise calls `load` and caches its result. Errors
    /// from `load` are returned as-is and leave no entry behind.
    pub fn get_or_load<F>(
        &mut self,
        key: &K,
        sources: &[&Path],
        load: F,
    ) -> Result<Arc<V>, FiscalError>
    where
        F: FnOnce() -> Result<V, FiscalError>,
    {
        let fingerprints = sources
            .iter()
            .map(|path| Fingerprint::of(path).map(|fingerprint| (path.to_path_buf(), fingerprint)))
            .collect::<Result<Vec<_>, FiscalError>>()?;

        if let Some(entry) = self.entries.get(key) {
            if entry.fingerprints == fingerprints {
                self.hits += 1;
                debug!("source cache hit");
                return Ok(Arc::clone(&entry.value));
            }
            debug!("source fingerprint changed, reloading");
        }

        self.misses += 1;
        self.entries.remove(key);
        let value = Arc::new(load()?);
        self.entries.insert(
            key.clone(),
            CacheEntry {
                fingerprints,
                value: Arc::clone(&value),
            },
        );

        Ok(value)
    }

    /// Drops the entry for `key`, if any.
    pub fn invalidate(&mut self, key: &K) {
        self.entries.remove(key);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}
