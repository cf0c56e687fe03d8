//! Configuration management for pixfetch
//!
//! One TOML-friendly configuration struct covers every exposed knob:
//! scheduler concurrency, cache behavior, fit geometry defaults, the two
//! deferred-start gates, and HTTP client tuning. Loading is zero-config:
//! a missing file yields the defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::app::cache::CacheConfig;
use crate::app::client::ClientConfig;
use crate::app::geometry::{CropAnchor, FitOptions, LandscapeMode};
use crate::constants::{http, scheduler};
use crate::errors::{ConfigError, ConfigResult};

/// Unified loader configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Maximum concurrent fetches, process-wide
    pub max_concurrency: usize,
    /// Enable the persistent disk cache
    pub cache_enabled: bool,
    /// Cache directory; `None` selects the OS cache directory
    pub cache_root: Option<PathBuf>,
    /// Scale images up when the source is smaller than the target box
    pub enlarge: bool,
    /// Preserve the source aspect ratio when resizing
    pub keep_aspect_ratio: bool,
    /// Scale to cover the target box and crop, instead of fitting inside
    pub fit_from_outside: bool,
    /// Which part of the image survives cropping
    pub crop_anchor: CropAnchor,
    /// Automatic rotation of landscape sources
    pub landscape_mode: LandscapeMode,
    /// Post-process images to the requested size
    pub resize_images: bool,
    /// Hold new requests until an explicit load activation
    pub defer_load_until_activate: bool,
    /// Hold ready results until an explicit display activation
    pub defer_display_until_activate: bool,
    /// Mark deliveries served from cache as not-to-animate
    pub skip_animation_from_cache: bool,
    /// HTTP request timeout in seconds
    pub request_timeout_secs: u64,
    /// HTTP connect timeout in seconds
    pub connect_timeout_secs: u64,
    /// Maximum idle connections per host
    pub pool_max_per_host: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_concurrency: scheduler::DEFAULT_MAX_CONCURRENCY,
            cache_enabled: true,
            cache_root: None,
            enlarge: true,
            keep_aspect_ratio: true,
            fit_from_outside: false,
            crop_anchor: CropAnchor::CenterCenter,
            landscape_mode: LandscapeMode::None,
            resize_images: true,
            defer_load_until_activate: false,
            defer_display_until_activate: false,
            skip_animation_from_cache: false,
            request_timeout_secs: http::DEFAULT_TIMEOUT.as_secs(),
            connect_timeout_secs: http::CONNECT_TIMEOUT.as_secs(),
            pool_max_per_host: http::POOL_MAX_PER_HOST,
        }
    }
}

impl LoaderConfig {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the file is missing or malformed.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        let config: LoaderConfig = toml::from_str(&content)?;
        config.validate()?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load from a file when given, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> ConfigResult<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Validate field ranges
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_concurrency".to_string(),
                value: "0".to_string(),
                reason: "at least one concurrent fetch is required".to_string(),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_secs".to_string(),
                value: "0".to_string(),
                reason: "a zero timeout would fail every request".to_string(),
            });
        }
        Ok(())
    }

    /// Cache configuration derived from these settings
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            cache_root: self.cache_root.clone(),
            enabled: self.cache_enabled,
        }
    }

    /// HTTP client configuration derived from these settings
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            pool_max_per_host: self.pool_max_per_host,
            ..ClientConfig::default()
        }
    }

    /// Default fit geometry derived from these settings
    pub fn fit_options(&self) -> FitOptions {
        FitOptions {
            fit_from_outside: self.fit_from_outside,
            keep_aspect_ratio: self.keep_aspect_ratio,
            allow_enlarge: self.enlarge,
            crop_anchor: self.crop_anchor,
            landscape_mode: self.landscape_mode,
        }
    }
}
