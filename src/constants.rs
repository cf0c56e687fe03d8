//! Application constants for pixfetch
//!
//! This module centralizes all constants used throughout the crate,
//! organized by functional domain for maintainability and clarity.

use std::time::Duration;

/// HTTP client configuration constants
pub mod http {
    use super::Duration;

    /// Default user agent for all HTTP requests
    pub const USER_AGENT: &str = "pixfetch/0.1.0 (Image Loader)";

    /// Default HTTP request timeout
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Connection pool idle timeout
    pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

    /// Maximum connections per host in pool
    pub const POOL_MAX_PER_HOST: usize = 8;
}

/// Retry configuration for the HTTP collaborator
///
/// Retry policy lives in the client, never in the load request core.
pub mod limits {
    /// Maximum retry attempts for transient failures
    pub const MAX_RETRIES: u32 = 3;

    /// Base delay for exponential backoff (milliseconds)
    pub const RETRY_BASE_DELAY_MS: u64 = 500;
}

/// Fetch scheduler configuration
pub mod scheduler {
    /// Default maximum concurrent fetches, process-wide
    pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

    /// Queue wait above this threshold is logged for diagnostics
    pub const QUEUE_WAIT_LOG_THRESHOLD_MS: i64 = 250;
}

/// File operation constants
pub mod files {
    /// Temporary file suffix for atomic cache publishes
    pub const TEMP_FILE_SUFFIX: &str = ".tmp";

    /// Directory name for the default cache root
    pub const CACHE_DIR_NAME: &str = "pixfetch";

    /// Marker separating the locator prefix from a thumbnail variant suffix
    pub const THUMB_MARKER: &str = "_thumb_";
}

// Re-export commonly used constants for convenience
pub use files::{CACHE_DIR_NAME, TEMP_FILE_SUFFIX};
pub use http::{DEFAULT_TIMEOUT as HTTP_TIMEOUT, USER_AGENT};
pub use limits::{MAX_RETRIES, RETRY_BASE_DELAY_MS};
pub use scheduler::DEFAULT_MAX_CONCURRENCY;
