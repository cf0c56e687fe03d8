//! Error types for pixfetch
//!
//! This module defines the error taxonomy for all components of the crate.
//! Each subsystem has its own error enum; `LoadError` is what a load request
//! reports to its caller, and `AppError` is the top-level type used by the
//! CLI and library consumers that do not care about the subsystem.

use std::path::PathBuf;
use thiserror::Error;

/// Network retrieval errors surfaced by the HTTP client collaborator
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP request error
    #[error("HTTP request failed")]
    Http(#[from] reqwest::Error),

    /// Invalid URL provided
    #[error("Invalid URL: {url} - {error}")]
    InvalidUrl { url: String, error: String },

    /// Server returned a non-success status
    #[error("Server error: HTTP {status}")]
    ServerError { status: u16 },

    /// Resource not found on the server
    #[error("Resource not found: {url}")]
    NotFound { url: String },

    /// Maximum retries exceeded for transient failures
    #[error("Maximum retry attempts ({max_retries}) exceeded for fetch")]
    MaxRetriesExceeded { max_retries: u32 },

    /// Local file retrieval failed
    #[error("Local file read failed: {path}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The fetch was cancelled cooperatively
    ///
    /// Not a true failure: the request layer converts this into a silent
    /// cancelled completion and never invokes the error hook.
    #[error("Fetch cancelled")]
    Cancelled,
}

/// Disk cache errors
#[derive(Error, Debug)]
pub enum CacheError {
    /// Cache directory not found or inaccessible
    #[error("Cache directory not accessible: {path}")]
    DirectoryNotAccessible { path: PathBuf },

    /// No artifact stored under the requested key
    #[error("No cached artifact for key: {key}")]
    NotFound { key: String },

    /// I/O error during cache operations
    #[error("Cache I/O error")]
    Io(#[from] std::io::Error),

    /// Atomic publish failed; the partially written temp file was discarded
    #[error("Atomic cache write failed: could not rename {temp_path} to {final_path}")]
    AtomicOperationFailed {
        temp_path: PathBuf,
        final_path: PathBuf,
    },
}

impl CacheError {
    /// True when a read failure should be treated as a soft cache miss
    /// rather than a request failure (availability over strictness).
    pub fn is_soft_miss(&self) -> bool {
        matches!(self, CacheError::NotFound { .. } | CacheError::Io(_))
    }
}

/// Fetch scheduler errors
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// The ticket was cancelled (or abandoned) before admission
    #[error("Admission ticket cancelled while queued")]
    Cancelled,
}

/// Terminal failure of one load request
#[derive(Error, Debug)]
pub enum LoadError {
    /// Empty or malformed source locator - a caller contract violation
    #[error("Invalid source locator: {reason}")]
    InvalidLocator { reason: String },

    /// Network retrieval failed; the core does not retry
    #[error(transparent)]
    Network(#[from] FetchError),

    /// Raw bytes could not be decoded into a bitmap
    #[error("Image decode failed")]
    Decode(#[source] image::ImageError),

    /// The transform produced a degenerate result
    #[error("Transform failed: {reason}")]
    Transform { reason: String },

    /// Cache failure on a path where it is fatal (explicit cache reads)
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Invalid configuration format
    #[error("Invalid configuration format")]
    InvalidFormat(#[from] toml::de::Error),

    /// I/O error reading configuration
    #[error("I/O error reading configuration")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}. {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Fetch error
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Cache error
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Scheduler error
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    /// Load request error
    #[error(transparent)]
    Load(#[from] LoadError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Check if the error is recoverable (transient)
    pub fn is_recoverable(&self) -> bool {
        match self {
            AppError::Fetch(FetchError::Http(_))
            | AppError::Fetch(FetchError::ServerError { .. })
            | AppError::Fetch(FetchError::MaxRetriesExceeded { .. })
            | AppError::Load(LoadError::Network(_))
            | AppError::Cache(CacheError::Io(_)) => true,

            AppError::Load(LoadError::InvalidLocator { .. })
            | AppError::Load(LoadError::Decode(_))
            | AppError::Load(LoadError::Transform { .. })
            | AppError::Config(_) => false,

            _ => false,
        }
    }

    /// Get error category for logging and metrics
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Fetch(_) => "fetch",
            AppError::Cache(_) => "cache",
            AppError::Scheduler(_) => "scheduler",
            AppError::Load(_) => "load",
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Fetch result type alias
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Cache result type alias
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Scheduler result type alias
pub type SchedulerResult<T> = std::result::Result<T, SchedulerError>;

/// Load result type alias
pub type LoadResult<T> = std::result::Result<T, LoadError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_soft_miss_classification() {
        let not_found = CacheError::NotFound {
            key: "abc".to_string(),
        };
        assert!(not_found.is_soft_miss());

        let io = CacheError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk"));
        assert!(io.is_soft_miss());

        let dir = CacheError::DirectoryNotAccessible {
            path: PathBuf::from("/nope"),
        };
        assert!(!dir.is_soft_miss());
    }

    #[test]
    fn test_error_categories() {
        let err = AppError::from(FetchError::ServerError { status: 503 });
        assert_eq!(err.category(), "fetch");
        assert!(err.is_recoverable());

        let err = AppError::from(LoadError::InvalidLocator {
            reason: "empty".to_string(),
        });
        assert_eq!(err.category(), "load");
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_cancelled_fetch_is_distinct() {
        // Cancellation must be distinguishable so the request layer can
        // suppress the error hook for it.
        let err = FetchError::Cancelled;
        assert!(matches!(err, FetchError::Cancelled));
    }
}
