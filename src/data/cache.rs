//! Dataset cache
//!
//! Memoizes expensive per-file computations (parsed frames, prepared splits)
//! keyed by the canonical path and the file's modification time. A changed
//! mtime invalidates the entry, so edits to a dataset on disk are picked up
//! on the next access. Capacity-bounded with least-recently-used eviction.

use crate::error::Result;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::debug;

struct Entry<T> {
    value: Arc<T>,
    mtime: SystemTime,
    last_used: u64,
}

struct Inner<T> {
    entries: HashMap<PathBuf, Entry<T>>,
    tick: u64,
    hits: u64,
    misses: u64,
}

/// LRU cache over per-file computed values, invalidated by file mtime
pub struct DatasetCache<T> {
    inner: RwLock<Inner<T>>,
    capacity: usize,
}

impl<T> DatasetCache<T> {
    /// Create a cache holding at most `capacity` entries
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(Inner {
                entries: HashMap::new(),
                tick: 0,
                hits: 0,
                misses: 0,
            }),
            capacity: capacity.max(1),
        }
    }

    /// Fetch the cached value for `path`, computing it with `build` on a
    /// miss or when the file has been modified since it was cached
    pub fn get_or_compute<F>(&self, path: impl AsRef<Path>, build: F) -> Result<Arc<T>>
    where
        F: FnOnce(&Path) -> Result<T>,
    {
        let path = path.as_ref();
        let key = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let mtime = std::fs::metadata(&key).and_then(|m| m.modified()).ok();

        {
            let mut inner = self.inner.write();
            inner.tick += 1;
            let tick = inner.tick;
            if let Some(entry) = inner.entries.get_mut(&key) {
                if Some(entry.mtime) == mtime {
                    entry.last_used = tick;
                    let value = Arc::clone(&entry.value);
                    inner.hits += 1;
                    return Ok(value);
                }
                debug!(path = %key.display(), "cache entry stale, recomputing");
                inner.entries.remove(&key);
            }
            inner.misses += 1;
        }

        // Build outside the lock; concurrent misses may compute twice but
        // the last writer wins, which is harmless for pure loads.
        let value = Arc::new(build(&key)?);

        let mut inner = self.inner.write();
        if inner.entries.len() >= self.capacity {
            if let Some(oldest) = inner
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| k.clone())
            {
                inner.entries.remove(&oldest);
            }
        }
        let tick = inner.tick;
        inner.entries.insert(
            key,
            Entry {
                value: Arc::clone(&value),
                mtime: mtime.unwrap_or(SystemTime::UNIX_EPOCH),
                last_used: tick,
            },
        );
        Ok(value)
    }

    /// Drop every cached entry
    pub fn clear(&self) {
        self.inner.write().entries.clear();
    }

    /// (hits, misses) since creation
    pub fn stats(&self) -> (u64, u64) {
        let inner = self.inner.read();
        (inner.hits, inner.misses)
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_second_access_hits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        std::fs::write(&path, "a,b\n1,2\n").unwrap();

        let cache: DatasetCache<String> = DatasetCache::new(4);
        let builds = AtomicUsize::new(0);
        for _ in 0..3 {
            let v = cache
                .get_or_compute(&path, |p| {
                    builds.fetch_add(1, Ordering::SeqCst);
                    Ok(std::fs::read_to_string(p)?)
                })
                .unwrap();
            assert_eq!(v.as_str(), "a,b\n1,2\n");
        }

        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats(), (2, 1));
    }

    #[test]
    fn test_modified_file_recomputes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        std::fs::write(&path, "v1").unwrap();

        let cache: DatasetCache<String> = DatasetCache::new(4);
        let first = cache
            .get_or_compute(&path, |p| Ok(std::fs::read_to_string(p)?))
            .unwrap();
        assert_eq!(first.as_str(), "v1");

        // Force a distinct mtime
        std::fs::write(&path, "v2").unwrap();
        let past = SystemTime::now() - std::time::Duration::from_secs(60);
        let file = std::fs::File::open(&path).unwrap();
        file.set_modified(past).unwrap();

        let second = cache
            .get_or_compute(&path, |p| Ok(std::fs::read_to_string(p)?))
            .unwrap();
        assert_eq!(second.as_str(), "v2");
    }

    #[test]
    fn test_capacity_evicts_least_recently_used() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<_> = (0..3)
            .map(|i| {
                let p = dir.path().join(format!("f{i}.csv"));
                std::fs::write(&p, format!("{i}")).unwrap();
                p
            })
            .collect();

        let cache: DatasetCache<String> = DatasetCache::new(2);
        for p in &paths {
            cache
                .get_or_compute(p, |p| Ok(std::fs::read_to_string(p)?))
                .unwrap();
        }
        assert_eq!(cache.len(), 2);
    }
}
