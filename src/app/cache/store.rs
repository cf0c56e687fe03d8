//! Persistent key-to-blob store with atomic publishes
//!
//! Artifacts live as flat files inside one cache root, named by their
//! derived cache key. Writes go through a temp-file-then-rename publish so
//! a concurrent reader never observes a partially written artifact. Because
//! every key derived from one locator shares that locator's digest prefix,
//! removing all variants of a source is a directory scan, not an index
//! lookup.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::fs;
use tracing::{debug, error, info};

use crate::app::key::{self, CacheKey};
use crate::app::locator::SourceLocator;
use crate::constants::files;
use crate::errors::{CacheError, CacheResult};

use super::config::CacheConfig;

/// Sequence for unique temp-file names under concurrent writers
static TEMP_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Disk cache store shared by all load requests
#[derive(Debug)]
pub struct CacheStore {
    config: CacheConfig,
    cache_root: PathBuf,
}

/// Point-in-time cache statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct CacheStats {
    /// Cache root directory
    pub cache_root: PathBuf,
    /// Number of stored artifacts
    pub artifact_count: usize,
    /// Total bytes across all artifacts
    pub total_bytes: u64,
}

impl CacheStore {
    /// Create a cache store, resolving and creating the root directory
    ///
    /// # Errors
    ///
    /// Returns `CacheError` if the cache directory cannot be created or the
    /// OS cache location cannot be determined.
    pub async fn new(config: CacheConfig) -> CacheResult<Self> {
        let cache_root = match &config.cache_root {
            Some(path) => path.clone(),
            None => Self::default_cache_dir()?,
        };

        Self::ensure_directory_exists(&cache_root).await?;

        info!("Initialized cache store at {}", cache_root.display());

        Ok(Self { config, cache_root })
    }

    /// The resolved cache root directory
    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    /// Whether this store reads and writes artifacts at all
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Default cache directory for the current OS
    ///
    /// - macOS: `~/Library/Caches/pixfetch`
    /// - Linux: `~/.cache/pixfetch`
    /// - Windows: `%LOCALAPPDATA%/pixfetch`
    fn default_cache_dir() -> CacheResult<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| CacheError::DirectoryNotAccessible {
                path: PathBuf::from("system cache directory"),
            })?
            .join(files::CACHE_DIR_NAME);
        Ok(cache_dir)
    }

    /// Ensure a directory exists, creating it if necessary
    async fn ensure_directory_exists(path: &Path) -> CacheResult<()> {
        if !path.exists() {
            fs::create_dir_all(path).await.map_err(|e| {
                error!("Failed to create cache directory: {}", e);
                CacheError::DirectoryNotAccessible {
                    path: path.to_path_buf(),
                }
            })?;
            debug!("Created cache directory: {}", path.display());
        }
        Ok(())
    }

    /// On-disk path of the artifact for a key
    ///
    /// The path is derived whether or not the artifact exists.
    pub fn artifact_path(&self, cache_key: &CacheKey) -> PathBuf {
        self.cache_root.join(cache_key.file_name())
    }

    /// Check whether an artifact exists under the key
    pub async fn exists(&self, cache_key: &CacheKey) -> bool {
        if !self.config.enabled {
            return false;
        }
        fs::try_exists(self.artifact_path(cache_key))
            .await
            .unwrap_or(false)
    }

    /// Read the artifact stored under the key
    ///
    /// # Errors
    ///
    /// Returns `CacheError::NotFound` when no artifact exists (or the store
    /// is disabled), `CacheError::Io` on read failures. Callers on the load
    /// path treat both as a soft miss.
    pub async fn read(&self, cache_key: &CacheKey) -> CacheResult<Vec<u8>> {
        if !self.config.enabled {
            return Err(CacheError::NotFound {
                key: cache_key.file_name().to_string(),
            });
        }

        let path = self.artifact_path(cache_key);
        match fs::read(&path).await {
            Ok(bytes) => {
                debug!("Cache hit: {} ({} bytes)", cache_key, bytes.len());
                Ok(bytes)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(CacheError::NotFound {
                key: cache_key.file_name().to_string(),
            }),
            Err(e) => Err(CacheError::Io(e)),
        }
    }

    /// Write an artifact atomically under the key
    ///
    /// Content is written to a temp file in the cache root and renamed into
    /// place, so readers only ever see complete artifacts. A disabled store
    /// accepts and discards the write.
    ///
    /// # Errors
    ///
    /// Returns `CacheError` on I/O failure; the temp file is removed and no
    /// partial artifact becomes visible under the final key.
    pub async fn write(&self, cache_key: &CacheKey, content: &[u8]) -> CacheResult<()> {
        if !self.config.enabled {
            debug!("Cache disabled, discarding write for {}", cache_key);
            return Ok(());
        }

        let final_path = self.artifact_path(cache_key);
        let sequence = TEMP_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let temp_path = self.cache_root.join(format!(
            "{}.{}{}",
            cache_key.file_name(),
            sequence,
            files::TEMP_FILE_SUFFIX
        ));

        if let Err(e) = fs::write(&temp_path, content).await {
            error!("Failed to write temp cache file: {}", e);
            let _ = fs::remove_file(&temp_path).await;
            return Err(CacheError::Io(e));
        }

        if let Err(e) = fs::rename(&temp_path, &final_path).await {
            error!("Failed to publish cache artifact: {}", e);
            let _ = fs::remove_file(&temp_path).await;
            return Err(CacheError::AtomicOperationFailed {
                temp_path,
                final_path,
            });
        }

        debug!("Cached artifact {} ({} bytes)", cache_key, content.len());
        Ok(())
    }

    /// Delete the artifact under the key
    ///
    /// Returns the number of artifacts removed (0 or 1).
    pub async fn delete(&self, cache_key: &CacheKey) -> CacheResult<usize> {
        let path = self.artifact_path(cache_key);
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Deleted cached artifact {}", cache_key);
                Ok(1)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(CacheError::Io(e)),
        }
    }

    /// Delete every artifact derived from the locator
    ///
    /// Removes all scale and thumbnail variants by scanning the cache root
    /// for the locator's digest prefix. Returns the number removed.
    pub async fn remove_by_locator(&self, locator: &SourceLocator) -> CacheResult<usize> {
        let prefix = key::locator_prefix(locator);
        let mut removed = 0;

        let mut entries = fs::read_dir(&self.cache_root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !name.starts_with(&prefix) || name.ends_with(files::TEMP_FILE_SUFFIX) {
                continue;
            }
            match fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(CacheError::Io(e)),
            }
        }

        info!("Removed {} cached variants for {}", removed, locator);
        Ok(removed)
    }

    /// Delete every artifact in the cache
    pub async fn clear_all(&self) -> CacheResult<()> {
        let mut entries = fs::read_dir(&self.cache_root).await?;
        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                match fs::remove_file(entry.path()).await {
                    Ok(()) => removed += 1,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(CacheError::Io(e)),
                }
            }
        }
        info!("Cleared cache ({} artifacts removed)", removed);
        Ok(())
    }

    /// Scan the cache root for artifact count and total size
    pub async fn stats(&self) -> CacheStats {
        let mut artifact_count = 0;
        let mut total_bytes = 0;

        if let Ok(mut entries) = fs::read_dir(&self.cache_root).await {
            while let Ok(Some(entry)) = entries.next_entry().await {
                if let Ok(metadata) = entry.metadata().await {
                    if metadata.is_file() {
                        artifact_count += 1;
                        total_bytes += metadata.len();
                    }
                }
            }
        }

        CacheStats {
            cache_root: self.cache_root.clone(),
            artifact_count,
            total_bytes,
        }
    }
}
