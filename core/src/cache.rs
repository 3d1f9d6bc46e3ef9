//! Caller-owned dataset cache.
//!
//! Keyed by (source path, BLAKE3 hash of the file content): an unchanged
//! file is parsed once and shared; an edited file gets a fresh entry.
//! There is no process-wide cache; whoever owns a `DatasetCache` owns
//! its lifetime.

use crate::{
    error::AnalysisResult,
    loader::{AidTable, DatasetLoader, FirmTable},
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub path:         PathBuf,
    pub content_hash: String,
}

impl CacheKey {
    pub fn new(path: &Path, content: &[u8]) -> Self {
        Self {
            path:         path.to_path_buf(),
            content_hash: blake3::hash(content).to_hex().to_string(),
        }
    }
}

#[derive(Default)]
pub struct DatasetCache {
    firms:  HashMap<CacheKey, Arc<FirmTable>>,
    aid:    HashMap<CacheKey, Arc<AidTable>>,
    hits:   u64,
    misses: u64,
}

impl DatasetCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn firms(&mut self, loader: &DatasetLoader, path: &Path) -> AnalysisResult<Arc<FirmTable>> {
        let content = std::fs::read(path)?;
        let key = CacheKey::new(path, &content);
        if let Some(table) = self.firms.get(&key) {
            self.hits += 1;
            log::debug!("cache hit: {} ({})", path.display(), &key.content_hash[..12]);
            return Ok(Arc::clone(table));
        }
        self.misses += 1;
        let table = Arc::new(loader.load_firms(content.as_slice(), &path.display().to_string())?);
        self.firms.insert(key, Arc::clone(&table));
        Ok(table)
    }

    pub fn aid(&mut self, loader: &DatasetLoader, path: &Path) -> AnalysisResult<Arc<AidTable>> {
        let content = std::fs::read(path)?;
        let key = CacheKey::new(path, &content);
        if let Some(table) = self.aid.get(&key) {
            self.hits += 1;
            log::debug!("cache hit: {} ({})", path.display(), &key.content_hash[..12]);
            return Ok(Arc::clone(table));
        }
        self.misses += 1;
        let table = Arc::new(loader.load_aid(content.as_slice(), &path.display().to_string())?);
        self.aid.insert(key, Arc::clone(&table));
        Ok(table)
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn len(&self) -> usize {
        self.firms.len() + self.aid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.firms.clear();
        self.aid.clear();
    }
}
