//! Core engine for pixfetch
//!
//! This module contains the fetch/cache/transform pipeline: locator and
//! cache key handling, the geometry planner and codec, the disk cache, the
//! process-wide fetch scheduler, the per-call request state machine, and
//! the loader facade that ties them together.
//!
//! # Examples
//!
//! ```rust,no_run
//! use pixfetch::app::{Loader, SourceLocator};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let loader = Loader::with_defaults().await?;
//!
//! let locator = SourceLocator::parse("https://example.com/photo.jpg")?;
//! let mut handle = loader.load(locator, loader.options().with_target(256.0, 256.0));
//!
//! match handle.completion().await {
//!     completion if completion.is_delivered() => println!("ready"),
//!     completion => eprintln!("no image: {:?}", completion.error()),
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod client;
pub mod codec;
pub mod geometry;
pub mod key;
pub mod loader;
pub mod locator;
pub mod request;
pub mod scheduler;

// Re-export main public API
pub use cache::{CacheConfig, CacheStats, CacheStore};
pub use client::{ClientConfig, HttpClient};
pub use geometry::{
    plan, CropAnchor, Dimensions, FitOptions, LandscapeMode, Rect, Rotation, TransformPlan,
};
pub use key::{derive_key, CacheKey, ScaleHint};
pub use loader::Loader;
pub use locator::SourceLocator;
pub use request::{Delivery, LoadCompletion, LoadEvent, LoadHandle, LoadOptions, LoadState};
pub use scheduler::{AdmissionTicket, FetchGrant, FetchScheduler};
