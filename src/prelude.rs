//! Prelude module for the pixfetch library
//!
//! Re-exports the most commonly used items, so typical integrations only
//! need a single `use pixfetch::prelude::*;` statement.
//!
//! # Usage
//!
//! ```rust,no_run
//! use pixfetch::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let loader = Loader::with_defaults().await?;
//!     let locator = SourceLocator::parse("https://example.com/photo.jpg")?;
//!     let mut handle = loader.load(locator, loader.options());
//!     let _completion = handle.completion().await;
//!     Ok(())
//! }
//! ```

// Core result types
pub use crate::errors::{AppError, LoadError, Result};

// Essential app components
pub use crate::app::{
    CacheStats,
    CropAnchor,
    Delivery,
    Dimensions,
    FitOptions,
    LandscapeMode,
    LoadCompletion,
    LoadEvent,
    LoadHandle,
    LoadOptions,
    LoadState,
    Loader,
    ScaleHint,
    SourceLocator,
};

// Configuration
pub use crate::config::LoaderConfig;
