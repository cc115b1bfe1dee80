use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;

use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};

/// Raw document text keyed by source URL
///
/// The loader consults the cache before fetching and fills it after a
/// successful fetch. It only ever stores unparsed text.
#[async_trait]
pub trait TextCache: Send + Sync {
    async fn get(&self, url: &str) -> CacheResult<Option<String>>;
    async fn set(&self, url: &str, text: &str) -> CacheResult<()>;
}

/// Generate a cache key from a URL
pub fn generate_key(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    format!("document_{:x}", hasher.finalize())
}

/// Metadata for cached document entries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub key: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub size_bytes: u64,
}

impl CacheMetadata {
    pub fn new(key: String, url: String, ttl: Duration) -> Self {
        let now = Utc::now();
        // A TTL past the end of the calendar falls back to one day
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or_else(|| now + chrono::Duration::hours(24));

        Self {
            key,
            url,
            created_at: now,
            expires_at,
            size_bytes: 0,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size_bytes = size;
        self
    }
}

/// A cached document with its metadata
#[derive(Debug, Clone)]
pub struct CachedDocument {
    pub text: Arc<str>,
    pub metadata: CacheMetadata,
}

impl CachedDocument {
    pub fn new(text: &str, metadata: CacheMetadata) -> Self {
        Self {
            text: Arc::from(text),
            metadata,
        }
    }
}

/// Disk cache implementation using cacache for persistent, corruption-resistant storage
pub struct DiskCache {
    cache_dir: PathBuf,
    ttl: Duration,
}

impl DiskCache {
    pub fn new(cache_dir: PathBuf, ttl: Duration) -> Self {
        Self { cache_dir, ttl }
    }

    /// Get a document by cache key; expired entries are removed and missed
    pub async fn get_entry(&self, key: &str) -> CacheResult<Option<CachedDocument>> {
        let metadata = match self.get_metadata(key).await? {
            Some(metadata) if !metadata.is_expired() => metadata,
            _ => {
                let _ = self.remove(key).await;
                return Ok(None);
            }
        };

        let data = match cacache::read(&self.cache_dir, key).await {
            Ok(data) => data,
            Err(cacache::Error::EntryNotFound(_, _)) => return Ok(None),
            Err(e) => {
                return Err(CacheError::ReadError {
                    key: key.to_string(),
                    details: e.to_string(),
                });
            }
        };

        let text = String::from_utf8(data).map_err(|e| CacheError::Corruption {
            key: key.to_string(),
            details: e.to_string(),
        })?;

        Ok(Some(CachedDocument::new(&text, metadata)))
    }

    /// Store a document under a cache key
    pub async fn set_entry(&self, key: &str, text: &str, metadata: CacheMetadata) -> CacheResult<()> {
        cacache::write(&self.cache_dir, key, text.as_bytes())
            .await
            .map_err(|e| CacheError::WriteError {
                key: key.to_string(),
                details: e.to_string(),
            })?;

        self.set_metadata(key, &metadata).await
    }

    async fn remove(&self, key: &str) -> CacheResult<()> {
        let _ = cacache::remove(&self.cache_dir, key).await;
        let _ = fs::remove_file(self.metadata_path(key)).await;
        Ok(())
    }

    /// Clean up expired entries
    pub async fn cleanup_expired(&self) -> CacheResult<CleanupStats> {
        let mut cleanup_stats = CleanupStats::default();

        let entries = cacache::index::ls(&self.cache_dir)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| CacheError::CleanupFailed {
                details: format!("Failed to read cache index: {}", e),
            })?;

        for entry in entries {
            if let Ok(Some(metadata)) = self.get_metadata(&entry.key).await
                && metadata.is_expired()
            {
                cleanup_stats.expired_entries += 1;
                cleanup_stats.freed_bytes += entry.size as u64;

                if let Err(e) = self.remove(&entry.key).await {
                    cleanup_stats
                        .errors
                        .push(format!("Failed to remove {}: {}", entry.key, e));
                } else {
                    cleanup_stats.removed_entries += 1;
                }
            }
        }

        Ok(cleanup_stats)
    }

    pub async fn clear(&self) -> CacheResult<()> {
        cacache::clear(&self.cache_dir)
            .await
            .map_err(|e| CacheError::CleanupFailed {
                details: format!("Failed to clear disk cache: {}", e),
            })?;

        match fs::remove_dir_all(self.cache_dir.join("metadata")).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::CleanupFailed {
                details: format!("Failed to remove metadata: {}", e),
            }),
        }
    }

    async fn get_metadata(&self, key: &str) -> CacheResult<Option<CacheMetadata>> {
        match fs::read_to_string(self.metadata_path(key)).await {
            Ok(content) => {
                let metadata = serde_json::from_str(&content).map_err(|e| CacheError::Corruption {
                    key: key.to_string(),
                    details: format!("Failed to parse metadata: {}", e),
                })?;
                Ok(Some(metadata))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::ReadError {
                key: key.to_string(),
                details: format!("Failed to read metadata: {}", e),
            }),
        }
    }

    async fn set_metadata(&self, key: &str, metadata: &CacheMetadata) -> CacheResult<()> {
        let metadata_path = self.metadata_path(key);
        let write_error = |details: String| CacheError::WriteError {
            key: key.to_string(),
            details,
        };

        if let Some(parent) = metadata_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| write_error(format!("Failed to create metadata directory: {}", e)))?;
        }

        let content = serde_json::to_string_pretty(metadata)
            .map_err(|e| write_error(format!("Failed to serialize metadata: {}", e)))?;

        fs::write(&metadata_path, content)
            .await
            .map_err(|e| write_error(format!("Failed to write metadata: {}", e)))
    }

    fn metadata_path(&self, key: &str) -> PathBuf {
        self.cache_dir
            .join("metadata")
            .join(format!("{}.json", key))
    }
}

#[async_trait]
impl TextCache for DiskCache {
    async fn get(&self, url: &str) -> CacheResult<Option<String>> {
        let entry = self.get_entry(&generate_key(url)).await?;
        Ok(entry.map(|document| document.text.to_string()))
    }

    async fn set(&self, url: &str, text: &str) -> CacheResult<()> {
        let key = generate_key(url);
        let metadata =
            CacheMetadata::new(key.clone(), url.to_string(), self.ttl).with_size(text.len() as u64);
        self.set_entry(&key, text, metadata).await
    }
}

/// Memory cache implementation using Moka for high-performance in-memory caching
pub struct MemoryCache {
    cache: Cache<String, Arc<CachedDocument>>,
    ttl: Duration,
}

impl MemoryCache {
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .build();

        Self { cache, ttl }
    }

    pub async fn get_entry(&self, key: &str) -> Option<Arc<CachedDocument>> {
        self.cache.get(key).await
    }

    pub async fn set_entry(&self, key: String, document: Arc<CachedDocument>) {
        self.cache.insert(key, document).await;
    }

    pub async fn clear(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
    }
}

#[async_trait]
impl TextCache for MemoryCache {
    async fn get(&self, url: &str) -> CacheResult<Option<String>> {
        let entry = self.get_entry(&generate_key(url)).await;
        Ok(entry.map(|document| document.text.to_string()))
    }

    async fn set(&self, url: &str, text: &str) -> CacheResult<()> {
        let key = generate_key(url);
        let metadata =
            CacheMetadata::new(key.clone(), url.to_string(), self.ttl).with_size(text.len() as u64);
        self.set_entry(key, Arc::new(CachedDocument::new(text, metadata)))
            .await;
        Ok(())
    }
}

/// Cache that never stores anything, for runs with caching disabled
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCache;

#[async_trait]
impl TextCache for NoCache {
    async fn get(&self, _url: &str) -> CacheResult<Option<String>> {
        Ok(None)
    }

    async fn set(&self, _url: &str, _text: &str) -> CacheResult<()> {
        Ok(())
    }
}

/// Two-tier cache manager that combines memory and disk caching
pub struct DocumentCache {
    memory_cache: MemoryCache,
    disk_cache: DiskCache,
    ttl: Duration,
}

impl DocumentCache {
    pub fn new(config: &CacheConfig) -> Self {
        let ttl = Duration::from_secs(config.ttl_hours.saturating_mul(3600));

        Self {
            memory_cache: MemoryCache::new(
                config.max_memory_entries,
                Duration::from_secs(config.memory_ttl_seconds),
            ),
            disk_cache: DiskCache::new(config.directory.clone(), ttl),
            ttl,
        }
    }

    /// Memory first, then disk, then nothing
    pub async fn get_entry(&self, url: &str) -> CacheResult<Option<Arc<CachedDocument>>> {
        let key = generate_key(url);

        if let Some(document) = self.memory_cache.get_entry(&key).await {
            return Ok(Some(document));
        }

        if let Some(document) = self.disk_cache.get_entry(&key).await? {
            let document = Arc::new(document);
            self.memory_cache.set_entry(key, document.clone()).await;
            return Ok(Some(document));
        }

        Ok(None)
    }

    /// Memory entries expire on their own; only disk needs sweeping
    pub async fn cleanup_expired(&self) -> CacheResult<CleanupStats> {
        self.disk_cache.cleanup_expired().await
    }

    pub async fn clear(&self) -> CacheResult<()> {
        self.memory_cache.clear().await;
        self.disk_cache.clear().await
    }
}

#[async_trait]
impl TextCache for DocumentCache {
    async fn get(&self, url: &str) -> CacheResult<Option<String>> {
        let entry = self.get_entry(url).await?;
        Ok(entry.map(|document| document.text.to_string()))
    }

    async fn set(&self, url: &str, text: &str) -> CacheResult<()> {
        let key = generate_key(url);
        let metadata =
            CacheMetadata::new(key.clone(), url.to_string(), self.ttl).with_size(text.len() as u64);

        self.memory_cache
            .set_entry(
                key.clone(),
                Arc::new(CachedDocument::new(text, metadata.clone())),
            )
            .await;
        self.disk_cache.set_entry(&key, text, metadata).await
    }
}

#[derive(Debug, Default, Clone)]
pub struct CleanupStats {
    pub expired_entries: u64,
    pub removed_entries: u64,
    pub freed_bytes: u64,
    pub errors: Vec<String>,
}
