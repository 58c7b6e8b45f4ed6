use anyhow::Result;
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// Lazily populated prefix -> handler map shared by every request task.
///
/// Entries are never evicted. Construction for a prefix happens at most once:
/// a miss on the read lock is re-checked under the write lock before building.
#[derive(Debug)]
pub struct ProxyCache<H> {
    entries: RwLock<HashMap<String, Arc<H>>>,
    constructed: AtomicUsize,
    hits: AtomicUsize,
}

impl<H> Default for ProxyCache<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> ProxyCache<H> {
    pub fn new() -> Self {
        Self { entries: RwLock::new(HashMap::new()), constructed: AtomicUsize::new(0), hits: AtomicUsize::new(0) }
    }

    /// Look up a cached handler
    pub async fn get(&self, prefix: &str) -> Option<Arc<H>> {
        let handler = self.entries.read().await.get(prefix).cloned();
        if handler.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        handler
    }

    /// Return the cached handler for `prefix`, building and caching it on a miss.
    /// A failed build caches nothing.
    pub async fn get_or_try_insert<F>(&self, prefix: &str, build: F) -> Result<Arc<H>>
    where
        F: FnOnce() -> Result<H>,
    {
        if let Some(handler) = self.get(prefix).await {
            return Ok(handler);
        }

        let mut entries = self.entries.write().await;
        // Another request may have built it while we waited for the write lock
        if let Some(handler) = entries.get(prefix) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(handler.clone());
        }
        let handler = Arc::new(build()?);
        entries.insert(prefix.to_string(), handler.clone());
        self.constructed.fetch_add(1, Ordering::Relaxed);
        debug!("Cached forwarding handler for path prefix {}", prefix);
        Ok(handler)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Number of handlers built so far
    pub fn constructed(&self) -> usize {
        self.constructed.load(Ordering::Relaxed)
    }

    /// Number of lookups answered from the cache
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }
}
