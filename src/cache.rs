use crate::collection::FeatureCollection;
use crate::error::LoadError;
use crate::loader::load_dataset;
use log::debug;
use std::collections::HashMap;
use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;
use xxhash_rust::xxh3::xxh3_64;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    content_hash: u64,
    extension: String,
}

impl CacheKey {
    pub fn new(name: &str, bytes: &[u8]) -> Self {
        let extension = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        CacheKey {
            content_hash: xxh3_64(bytes),
            extension,
        }
    }
}

// Least-recently-used cache holding at most `capacity` collections.
pub struct LoadCache {
    entries: HashMap<CacheKey, (Arc<FeatureCollection>, u64)>,
    capacity: usize,
    last_access: u64,
}

impl LoadCache {
    pub fn with_capacity(capacity: usize) -> Self {
        LoadCache {
            entries: HashMap::with_capacity(capacity),
            capacity,
            last_access: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn get(&mut self, key: &CacheKey) -> Option<Arc<FeatureCollection>> {
        self.last_access += 1;
        let stamp = self.last_access;
        self.entries.get_mut(key).map(|entry| {
            entry.1 = stamp;
            Arc::clone(&entry.0)
        })
    }

    pub fn insert(&mut self, key: CacheKey, value: Arc<FeatureCollection>) {
        if self.capacity == 0 {
            return;
        }
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            self.evict_oldest();
        }
        self.last_access += 1;
        self.entries.insert(key, (value, self.last_access));
    }

    // Loads through the cache. Failed loads are not cached.
    pub fn load(&mut self, name: &str, bytes: &[u8]) -> Result<Arc<FeatureCollection>, LoadError> {
        let key = CacheKey::new(name, bytes);
        if let Some(hit) = self.get(&key) {
            debug!("Cache hit for {}", name);
            return Ok(hit);
        }
        let collection = Arc::new(load_dataset(name, bytes)?);
        self.insert(key, Arc::clone(&collection));
        Ok(collection)
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, (_, stamp))| *stamp)
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            self.entries.remove(&key);
        }
    }
}

impl Debug for LoadCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadCache")
            .field("length", &self.entries.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}
