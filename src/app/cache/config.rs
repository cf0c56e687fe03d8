//! Cache configuration

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration for the disk cache store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache root directory; `None` selects the OS cache directory
    pub cache_root: Option<PathBuf>,
    /// Master switch: a disabled cache never reads or writes artifacts
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_root: None,
            enabled: true,
        }
    }
}

impl CacheConfig {
    /// Configuration with an explicit cache root
    pub fn with_cache_root(cache_root: PathBuf) -> Self {
        Self {
            cache_root: Some(cache_root),
            ..Default::default()
        }
    }

    /// Configuration with caching switched off
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert!(config.enabled);
        assert!(config.cache_root.is_none());
    }

    #[test]
    fn test_explicit_root() {
        let config = CacheConfig::with_cache_root(PathBuf::from("/tmp/px"));
        assert_eq!(config.cache_root, Some(PathBuf::from("/tmp/px")));
        assert!(config.enabled);
    }

    #[test]
    fn test_disabled() {
        assert!(!CacheConfig::disabled().enabled);
    }
}
