//! Loader facade
//!
//! The loader owns one scheduler, one cache store and one HTTP client, and
//! injects them by shared reference into every request it spawns. One
//! instance per process is the expected shape, but the dependency is always
//! explicit; there is no global mutable state. Administrative operations
//! (cache removal, concurrency introspection and tuning) live here.

use std::path::PathBuf;
use std::sync::Arc;

use image::DynamicImage;

use crate::app::cache::{CacheStats, CacheStore};
use crate::app::client::HttpClient;
use crate::app::key::{self, ScaleHint};
use crate::app::locator::SourceLocator;
use crate::app::request::{self, LoadHandle, LoadOptions, RequestContext, RequestSource};
use crate::app::scheduler::FetchScheduler;
use crate::config::LoaderConfig;
use crate::errors::{CacheResult, Result};

/// Image loading engine: fetch, cache, transform, deliver
#[derive(Debug)]
pub struct Loader {
    config: LoaderConfig,
    scheduler: Arc<FetchScheduler>,
    store: Arc<CacheStore>,
    client: Arc<HttpClient>,
}

impl Loader {
    /// Create a loader from configuration
    ///
    /// # Errors
    ///
    /// Returns an error when the configuration is invalid, the cache root
    /// cannot be prepared, or the HTTP client cannot be built.
    pub async fn new(config: LoaderConfig) -> Result<Self> {
        config.validate()?;

        let scheduler = Arc::new(FetchScheduler::new(config.max_concurrency));
        let store = Arc::new(CacheStore::new(config.cache_config()).await?);
        let client = Arc::new(HttpClient::with_config(config.client_config())?);

        Ok(Self {
            config,
            scheduler,
            store,
            client,
        })
    }

    /// Create a loader with default configuration
    pub async fn with_defaults() -> Result<Self> {
        Self::new(LoaderConfig::default()).await
    }

    /// The loader's configuration
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Request options seeded from the configuration defaults
    pub fn options(&self) -> LoadOptions {
        LoadOptions::from_config(&self.config)
    }

    /// Start loading an image from a locator
    ///
    /// Returns immediately with a handle; the request runs on the runtime.
    /// Use [`SourceLocator::parse`] first to validate raw input - an empty
    /// or malformed locator never reaches this point.
    pub fn load(&self, locator: SourceLocator, options: LoadOptions) -> LoadHandle {
        request::spawn(RequestSource::Remote(locator), options, self.context())
    }

    /// Run an already-decoded bitmap through the transform/deliver tail
    ///
    /// Useful for resizing an in-memory image with the same geometry and
    /// gating behavior as a fetched one. Nothing is fetched or cached.
    pub fn load_bitmap(&self, bitmap: DynamicImage, options: LoadOptions) -> LoadHandle {
        request::spawn(RequestSource::Bitmap(bitmap), options, self.context())
    }

    /// Remove every cached variant for one locator
    ///
    /// Returns the number of artifacts deleted, across all scale and
    /// thumbnail variants.
    pub async fn remove_cached(&self, locator: &SourceLocator) -> CacheResult<usize> {
        self.store.remove_by_locator(locator).await
    }

    /// Remove every artifact from the cache
    pub async fn clear_cache(&self) -> CacheResult<()> {
        self.store.clear_all().await
    }

    /// The on-disk path an artifact for this locator would occupy
    ///
    /// Derivation only; the file exists once a load has finished.
    pub fn cache_path(
        &self,
        locator: &SourceLocator,
        scale: ScaleHint,
        thumbnail: Option<(u32, u32)>,
    ) -> PathBuf {
        self.store
            .artifact_path(&key::derive_key(locator, scale, thumbnail))
    }

    /// Current cache statistics
    pub async fn cache_stats(&self) -> CacheStats {
        self.store.stats().await
    }

    /// Fetches currently in flight, process-wide
    pub async fn active_count(&self) -> usize {
        self.scheduler.active_count().await
    }

    /// In-flight plus queued fetches
    pub async fn total_count(&self) -> usize {
        self.scheduler.total_count().await
    }

    /// Current fetch concurrency ceiling
    pub async fn max_concurrency(&self) -> usize {
        self.scheduler.max_concurrency().await
    }

    /// Change the fetch concurrency ceiling
    ///
    /// Active fetches are never pre-empted; lowering the ceiling only slows
    /// new admissions.
    pub async fn set_max_concurrency(&self, max_concurrency: usize) {
        self.scheduler.set_max_concurrency(max_concurrency).await;
    }

    fn context(&self) -> RequestContext {
        RequestContext {
            scheduler: Arc::clone(&self.scheduler),
            store: Arc::clone(&self.store),
            client: Arc::clone(&self.client),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn loader_in(temp: &TempDir) -> Loader {
        let config = LoaderConfig {
            cache_root: Some(temp.path().join("cache")),
            ..Default::default()
        };
        Loader::new(config).await.unwrap()
    }

    #[tokio::test]
    async fn test_loader_construction() {
        let temp = TempDir::new().unwrap();
        let loader = loader_in(&temp).await;
        assert_eq!(loader.max_concurrency().await, 8);
        assert_eq!(loader.active_count().await, 0);
        assert_eq!(loader.total_count().await, 0);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let config = LoaderConfig {
            max_concurrency: 0,
            ..Default::default()
        };
        assert!(Loader::new(config).await.is_err());
    }

    #[tokio::test]
    async fn test_concurrency_tuning() {
        let temp = TempDir::new().unwrap();
        let loader = loader_in(&temp).await;
        loader.set_max_concurrency(2).await;
        assert_eq!(loader.max_concurrency().await, 2);
    }

    #[tokio::test]
    async fn test_cache_path_derivation() {
        let temp = TempDir::new().unwrap();
        let loader = loader_in(&temp).await;
        let locator = SourceLocator::parse("https://example.com/a.jpg").unwrap();

        let full = loader.cache_path(&locator, ScaleHint::Unspecified, None);
        let thumb = loader.cache_path(&locator, ScaleHint::Unspecified, Some((64, 64)));

        assert!(full.starts_with(temp.path().join("cache")));
        assert_ne!(full, thumb);
        assert!(thumb.to_string_lossy().ends_with("_thumb_64x64"));
    }

    #[tokio::test]
    async fn test_options_follow_config() {
        let temp = TempDir::new().unwrap();
        let config = LoaderConfig {
            cache_root: Some(temp.path().join("cache")),
            fit_from_outside: true,
            skip_animation_from_cache: true,
            ..Default::default()
        };
        let loader = Loader::new(config).await.unwrap();
        let options = loader.options();
        assert!(options.fit.fit_from_outside);
        assert!(options.skip_animation_from_cache);
    }
}
