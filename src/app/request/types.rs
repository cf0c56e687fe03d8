//! Core data structures for load requests
//!
//! This module defines the observable request lifecycle, per-request
//! options, and the terminal completion value a caller receives: exactly
//! one of delivered, failed or cancelled per request.

use std::fmt;

use image::DynamicImage;
use reqwest::header::HeaderMap;

use crate::app::geometry::{Dimensions, FitOptions};
use crate::app::key::ScaleHint;
use crate::config::LoaderConfig;
use crate::errors::LoadError;

/// Observable lifecycle of one load request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// Constructed; the load gate may still be holding it
    Idle,
    /// The cache key has been derived
    KeyDerived,
    /// The cache held a usable artifact; no scheduler involvement
    CacheHit,
    /// Waiting for a fetch slot
    Queued,
    /// Retrieval in flight
    Fetching,
    /// Raw bytes are being decoded
    Decoding,
    /// The transform plan is being applied
    Transforming,
    /// Write-through to the cache
    Caching,
    /// Terminal: the result reached the caller
    Delivered,
    /// Terminal: the error hook fired
    Failed,
    /// Terminal: stopped without invoking any hook
    Cancelled,
}

impl LoadState {
    /// True for the three states no request ever leaves
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LoadState::Delivered | LoadState::Failed | LoadState::Cancelled
        )
    }
}

/// Options governing one load request
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Target box for the transform; `None` delivers the natural size
    pub target: Option<Dimensions>,
    /// Pixel-density hint; `Unspecified` infers from the file name
    pub scale: ScaleHint,
    /// Fit geometry (aspect, cover/contain, anchor, rotation)
    pub fit: FitOptions,
    /// Post-process the image to the requested size
    pub resize_images: bool,
    /// Extra HTTP headers forwarded to the retrieval collaborator
    pub headers: Option<HeaderMap>,
    /// Hold the request before key derivation until activated
    pub defer_load: bool,
    /// Hold the ready result before delivery until activated
    pub defer_display: bool,
    /// Mark cache-served deliveries as not-to-animate
    pub skip_animation_from_cache: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            target: None,
            scale: ScaleHint::Unspecified,
            fit: FitOptions::default(),
            resize_images: true,
            headers: None,
            defer_load: false,
            defer_display: false,
            skip_animation_from_cache: false,
        }
    }
}

impl LoadOptions {
    /// Options seeded from loader configuration defaults
    pub fn from_config(config: &LoaderConfig) -> Self {
        Self {
            target: None,
            scale: ScaleHint::Unspecified,
            fit: config.fit_options(),
            resize_images: config.resize_images,
            headers: None,
            defer_load: config.defer_load_until_activate,
            defer_display: config.defer_display_until_activate,
            skip_animation_from_cache: config.skip_animation_from_cache,
        }
    }

    /// Set the target box
    pub fn with_target(mut self, width: f64, height: f64) -> Self {
        self.target = Some(Dimensions::new(width, height));
        self
    }

    /// Override any deferred-start policy: both gates open from the start
    pub fn immediate(mut self) -> Self {
        self.defer_load = false;
        self.defer_display = false;
        self
    }
}

/// Successful result of one load request
pub struct Delivery {
    /// The ready-to-display bitmap
    pub bitmap: DynamicImage,
    /// Whether the artifact came from the cache rather than a fetch
    pub from_cache: bool,
    /// Final pixel size after all transforms
    pub final_size: (u32, u32),
    /// Delivery policy metadata: false when a cache hit should skip the
    /// presentation layer's animation
    pub animate: bool,
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("final_size", &self.final_size)
            .field("from_cache", &self.from_cache)
            .field("animate", &self.animate)
            .finish_non_exhaustive()
    }
}

/// The exactly-once terminal outcome of a load request
#[derive(Debug)]
pub enum LoadCompletion {
    /// Success: the bitmap and its delivery metadata
    Delivered(Delivery),
    /// Failure: the error hook value
    Failed(LoadError),
    /// Silent termination; no hook fires
    Cancelled,
}

impl LoadCompletion {
    /// True for a successful delivery
    pub fn is_delivered(&self) -> bool {
        matches!(self, LoadCompletion::Delivered(_))
    }

    /// True for silent cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, LoadCompletion::Cancelled)
    }

    /// Extract the delivery, if any
    pub fn delivery(self) -> Option<Delivery> {
        match self {
            LoadCompletion::Delivered(delivery) => Some(delivery),
            _ => None,
        }
    }

    /// Borrow the failure, if any
    pub fn error(&self) -> Option<&LoadError> {
        match self {
            LoadCompletion::Failed(error) => Some(error),
            _ => None,
        }
    }
}

/// Out-of-band notifications emitted while a request runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadEvent {
    /// Natural dimensions became known, ahead of final delivery
    SizeKnown { width: u32, height: u32 },
}
