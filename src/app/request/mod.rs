//! Per-call load orchestration
//!
//! A load request is a small state machine: derive the cache key, probe the
//! disk cache, otherwise ask the scheduler for a fetch slot, then decode,
//! transform, write back and deliver. Cancellation is checked at every state
//! transition boundary, so a cancelled request never invokes a delivery or
//! error hook and frees its scheduler slot promptly. Every request resolves
//! to exactly one terminal completion: delivered, failed or cancelled.
//!
//! Two independent gates can hold the machine: the load gate before key
//! derivation (defer network work until the image is actually needed) and
//! the display gate before delivery (defer hand-off until the result is
//! wanted on screen). Both are open by default.

mod types;

pub use types::{Delivery, LoadCompletion, LoadEvent, LoadOptions, LoadState};

use std::sync::Arc;

use image::DynamicImage;
use tokio::fs;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::app::cache::CacheStore;
use crate::app::client::HttpClient;
use crate::app::codec;
use crate::app::geometry;
use crate::app::key::{self, CacheKey, ScaleHint};
use crate::app::locator::SourceLocator;
use crate::app::scheduler::{FetchGrant, FetchScheduler};
use crate::errors::{CacheError, FetchError, LoadError, LoadResult, SchedulerError};

/// Shared collaborators injected into every request
#[derive(Debug, Clone)]
pub(crate) struct RequestContext {
    pub scheduler: Arc<FetchScheduler>,
    pub store: Arc<CacheStore>,
    pub client: Arc<HttpClient>,
}

/// What a request starts from
pub(crate) enum RequestSource {
    /// A locator to resolve, fetch and decode
    Remote(SourceLocator),
    /// An already-decoded bitmap; only the transform tail runs
    Bitmap(DynamicImage),
}

impl RequestSource {
    fn label(&self) -> String {
        match self {
            RequestSource::Remote(locator) => locator.to_string(),
            RequestSource::Bitmap(bitmap) => {
                format!("<bitmap {}x{}>", bitmap.width(), bitmap.height())
            }
        }
    }
}

/// Caller-side handle for one running load request
///
/// Dropping the handle abandons the request: it stops at the next gate or
/// cancellation checkpoint without delivering.
#[derive(Debug)]
pub struct LoadHandle {
    state_rx: watch::Receiver<LoadState>,
    cancel_tx: watch::Sender<bool>,
    load_gate_tx: watch::Sender<bool>,
    display_gate_tx: watch::Sender<bool>,
    events_rx: mpsc::UnboundedReceiver<LoadEvent>,
    completion_rx: oneshot::Receiver<LoadCompletion>,
}

impl LoadHandle {
    /// Current state of the request
    pub fn state(&self) -> LoadState {
        *self.state_rx.borrow()
    }

    /// Stop the request; no success or error hook will fire
    pub fn cancel(&self) {
        let _ = self.cancel_tx.send(true);
    }

    /// Open the load gate of a deferred request
    pub fn activate_load(&self) {
        let _ = self.load_gate_tx.send(true);
    }

    /// Open the display gate so a ready result can be delivered
    pub fn activate_display(&self) {
        let _ = self.display_gate_tx.send(true);
    }

    /// Open both gates
    pub fn activate(&self) {
        self.activate_load();
        self.activate_display();
    }

    /// Next out-of-band event, e.g. the size-known notification
    pub async fn next_event(&mut self) -> Option<LoadEvent> {
        self.events_rx.recv().await
    }

    /// Non-blocking event poll
    pub fn try_event(&mut self) -> Option<LoadEvent> {
        self.events_rx.try_recv().ok()
    }

    /// Wait for the terminal outcome
    ///
    /// Resolves exactly once; a second await reports cancellation.
    pub async fn completion(&mut self) -> LoadCompletion {
        (&mut self.completion_rx)
            .await
            .unwrap_or(LoadCompletion::Cancelled)
    }
}

/// Spawn a request onto the runtime and hand back its caller-side handle
pub(crate) fn spawn(
    source: RequestSource,
    options: LoadOptions,
    ctx: RequestContext,
) -> LoadHandle {
    let (state_tx, state_rx) = watch::channel(LoadState::Idle);
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let (load_gate_tx, load_gate_rx) = watch::channel(!options.defer_load);
    let (display_gate_tx, display_gate_rx) = watch::channel(!options.defer_display);
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (completion_tx, completion_rx) = oneshot::channel();

    let request = LoadRequest {
        options,
        state_tx,
        cancel_rx,
        load_gate_rx,
        display_gate_rx,
        events_tx,
    };

    tokio::spawn(async move {
        let completion = request.run(source, ctx).await;
        let _ = completion_tx.send(completion);
    });

    LoadHandle {
        state_rx,
        cancel_tx,
        load_gate_tx,
        display_gate_tx,
        events_rx,
        completion_rx,
    }
}

/// One caller-visible load operation
struct LoadRequest {
    options: LoadOptions,
    state_tx: watch::Sender<LoadState>,
    cancel_rx: watch::Receiver<bool>,
    load_gate_rx: watch::Receiver<bool>,
    display_gate_rx: watch::Receiver<bool>,
    events_tx: mpsc::UnboundedSender<LoadEvent>,
}

impl LoadRequest {
    /// Drive the machine to its single terminal outcome
    async fn run(self, source: RequestSource, ctx: RequestContext) -> LoadCompletion {
        let label = source.label();
        match self.execute(source, &ctx).await {
            Ok(Some(delivery)) => {
                self.set_state(LoadState::Delivered);
                info!(
                    "Delivered {} ({}x{}, from_cache: {})",
                    label, delivery.final_size.0, delivery.final_size.1, delivery.from_cache
                );
                LoadCompletion::Delivered(delivery)
            }
            Ok(None) => {
                self.set_state(LoadState::Cancelled);
                debug!("Cancelled load of {}", label);
                LoadCompletion::Cancelled
            }
            Err(error) => {
                self.set_state(LoadState::Failed);
                warn!("Load of {} failed: {}", label, error);
                LoadCompletion::Failed(error)
            }
        }
    }

    /// The state machine body; `Ok(None)` means silently cancelled
    async fn execute(
        &self,
        source: RequestSource,
        ctx: &RequestContext,
    ) -> LoadResult<Option<Delivery>> {
        // Idle: the load gate holds everything, including key derivation.
        if !self.await_gate_open(self.load_gate_rx.clone()).await {
            return Ok(None);
        }
        if self.is_cancelled() {
            return Ok(None);
        }

        let locator = match source {
            RequestSource::Bitmap(bitmap) => {
                self.emit_size_known(&bitmap);
                let (final_bitmap, _) = self.transform(bitmap)?;
                if self.is_cancelled() {
                    return Ok(None);
                }
                return self.deliver(final_bitmap, false).await;
            }
            RequestSource::Remote(locator) => locator,
        };

        let (locator, scale) = self.resolve_density(locator).await;
        self.set_state(LoadState::KeyDerived);
        let full_key = key::derive_key(&locator, scale, None);
        let thumb_key = self
            .thumbnail_size()
            .map(|size| key::derive_key(&locator, scale, Some(size)));

        // Probe the thumbnail variant first; it needs no further transform.
        if let Some(thumb_key) = &thumb_key {
            if let Some(bytes) = self.read_cached(ctx, thumb_key).await {
                self.set_state(LoadState::CacheHit);
                let bitmap = codec::decode(&bytes)?;
                self.emit_size_known(&bitmap);
                return self.deliver(bitmap, true).await;
            }
        }

        // Full-size artifact: transform again and refresh the thumbnail.
        if let Some(bytes) = self.read_cached(ctx, &full_key).await {
            self.set_state(LoadState::CacheHit);
            let bitmap = codec::decode(&bytes)?;
            self.emit_size_known(&bitmap);
            if self.is_cancelled() {
                return Ok(None);
            }
            let (final_bitmap, transformed) = self.transform(bitmap)?;
            if self.is_cancelled() {
                return Ok(None);
            }
            if transformed {
                if let Some(thumb_key) = &thumb_key {
                    self.set_state(LoadState::Caching);
                    self.write_thumbnail(ctx, thumb_key, &final_bitmap).await;
                }
            }
            return self.deliver(final_bitmap, true).await;
        }

        // Cache miss: the scheduler is the only road to a fetch.
        let ticket = ctx.scheduler.submit(&locator).await;
        let ticket_id = ticket.id();
        self.set_state(LoadState::Queued);

        let mut own_cancel = self.cancel_rx.clone();
        let grant = tokio::select! {
            biased;
            _ = wait_true(&mut own_cancel) => {
                // Dequeue, and release in case admission raced the cancel.
                ctx.scheduler.cancel(ticket_id).await;
                ctx.scheduler.release(ticket_id).await;
                return Ok(None);
            }
            admitted = ticket.admitted() => match admitted {
                Ok(grant) => grant,
                Err(SchedulerError::Cancelled) => return Ok(None),
            },
        };

        self.set_state(LoadState::Fetching);
        let fetched = self.retrieve(ctx, &locator, &grant).await;
        ctx.scheduler.release(ticket_id).await;
        let bytes = match fetched {
            Ok(bytes) => bytes,
            Err(FetchError::Cancelled) => return Ok(None),
            Err(error) => return Err(LoadError::Network(error)),
        };
        if self.is_cancelled() {
            return Ok(None);
        }

        self.set_state(LoadState::Decoding);
        let bitmap = codec::decode(&bytes)?;
        self.emit_size_known(&bitmap);
        if self.is_cancelled() {
            return Ok(None);
        }

        let (final_bitmap, transformed) = self.transform(bitmap)?;
        if self.is_cancelled() {
            return Ok(None);
        }

        // Write-through is best-effort: a cache failure is logged, never
        // surfaced, and the in-memory result is still delivered.
        self.set_state(LoadState::Caching);
        if let Err(e) = ctx.store.write(&full_key, &bytes).await {
            warn!("Cache write failed for {} (continuing): {}", full_key, e);
        }
        if transformed {
            if let Some(thumb_key) = &thumb_key {
                self.write_thumbnail(ctx, thumb_key, &final_bitmap).await;
            }
        }

        self.deliver(final_bitmap, false).await
    }

    /// Probe denser local siblings when the scale hint is unspecified
    ///
    /// For file locators without an explicit density marker, an `@3x` then
    /// `@2x` sibling is preferred when it exists, mirroring the platform's
    /// asset discovery rule. The chosen variant becomes the locator for the
    /// rest of the request, cache keys included.
    async fn resolve_density(&self, locator: SourceLocator) -> (SourceLocator, ScaleHint) {
        let scale = self.options.scale;
        if scale != ScaleHint::Unspecified || !locator.is_file() {
            return (locator, scale);
        }

        for (marker, variant_scale) in [("@3x", ScaleHint::X3), ("@2x", ScaleHint::X2)] {
            if let Some(variant) = locator.with_density_marker(marker) {
                let found = match variant.as_path() {
                    Some(path) => fs::try_exists(path).await.unwrap_or(false),
                    None => false,
                };
                if found {
                    debug!("Using density variant {}", variant);
                    return (variant, variant_scale);
                }
            }
        }
        (locator, scale)
    }

    /// Thumbnail dimensions for cache key derivation, when resizing applies
    fn thumbnail_size(&self) -> Option<(u32, u32)> {
        if !self.options.resize_images {
            return None;
        }
        let target = self.options.target?;
        if target.width <= 0.0 && target.height <= 0.0 {
            return None;
        }
        Some((target.width.round() as u32, target.height.round() as u32))
    }

    /// Read a cached artifact, degrading every failure to a miss
    async fn read_cached(&self, ctx: &RequestContext, cache_key: &CacheKey) -> Option<Vec<u8>> {
        match ctx.store.read(cache_key).await {
            Ok(bytes) => Some(bytes),
            Err(CacheError::NotFound { .. }) => None,
            Err(e) => {
                warn!("Cache read failed for {} (treated as miss): {}", cache_key, e);
                None
            }
        }
    }

    /// Retrieve raw bytes under an admission grant
    async fn retrieve(
        &self,
        ctx: &RequestContext,
        locator: &SourceLocator,
        grant: &FetchGrant,
    ) -> Result<Vec<u8>, FetchError> {
        let mut own_cancel = self.cancel_rx.clone();
        match locator {
            SourceLocator::Url(url) => {
                tokio::select! {
                    biased;
                    _ = wait_true(&mut own_cancel) => Err(FetchError::Cancelled),
                    result = ctx.client.fetch(
                        url,
                        self.options.headers.as_ref(),
                        grant.cancel_signal(),
                    ) => result,
                }
            }
            SourceLocator::File(path) => {
                if grant.is_cancelled() || *own_cancel.borrow() {
                    return Err(FetchError::Cancelled);
                }
                fs::read(path).await.map_err(|e| FetchError::FileRead {
                    path: path.clone(),
                    source: e,
                })
            }
        }
    }

    /// Apply the geometry plan when a target box is set
    ///
    /// Returns the bitmap and whether it actually changed.
    fn transform(&self, bitmap: DynamicImage) -> LoadResult<(DynamicImage, bool)> {
        let Some(target) = self.options.target else {
            return Ok((bitmap, false));
        };
        if !self.options.resize_images {
            return Ok((bitmap, false));
        }

        self.set_state(LoadState::Transforming);
        let plan = geometry::plan(codec::dimensions(&bitmap), target, &self.options.fit);
        if plan.is_identity() {
            return Ok((bitmap, false));
        }
        let out = codec::apply(&bitmap, &plan)?;
        Ok((out, true))
    }

    /// Encode and store a thumbnail variant, best-effort
    async fn write_thumbnail(
        &self,
        ctx: &RequestContext,
        cache_key: &CacheKey,
        bitmap: &DynamicImage,
    ) {
        match codec::encode_png(bitmap) {
            Ok(png) => {
                if let Err(e) = ctx.store.write(cache_key, &png).await {
                    warn!(
                        "Thumbnail cache write failed for {} (continuing): {}",
                        cache_key, e
                    );
                }
            }
            Err(e) => warn!("Thumbnail encode failed for {} (continuing): {}", cache_key, e),
        }
    }

    /// Hold at the display gate, then hand the result over
    async fn deliver(
        &self,
        bitmap: DynamicImage,
        from_cache: bool,
    ) -> LoadResult<Option<Delivery>> {
        if !self.await_gate_open(self.display_gate_rx.clone()).await {
            return Ok(None);
        }
        if self.is_cancelled() {
            return Ok(None);
        }

        let final_size = (bitmap.width(), bitmap.height());
        let animate = !(from_cache && self.options.skip_animation_from_cache);
        Ok(Some(Delivery {
            bitmap,
            from_cache,
            final_size,
            animate,
        }))
    }

    /// Wait until a gate opens; false means cancelled or abandoned
    async fn await_gate_open(&self, mut gate: watch::Receiver<bool>) -> bool {
        if *gate.borrow() {
            return true;
        }
        let mut cancel = self.cancel_rx.clone();
        loop {
            tokio::select! {
                biased;
                _ = wait_true(&mut cancel) => return false,
                changed = gate.changed() => match changed {
                    Ok(()) => {
                        if *gate.borrow() {
                            return true;
                        }
                    }
                    // Handle dropped with the gate still closed.
                    Err(_) => return false,
                },
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        *self.cancel_rx.borrow()
    }

    fn set_state(&self, state: LoadState) {
        let _ = self.state_tx.send(state);
    }

    fn emit_size_known(&self, bitmap: &DynamicImage) {
        let _ = self.events_tx.send(LoadEvent::SizeKnown {
            width: bitmap.width(),
            height: bitmap.height(),
        });
    }
}

/// Resolve once the signal flips to true; never resolves on a dead channel
async fn wait_true(signal: &mut watch::Receiver<bool>) {
    if *signal.borrow() {
        return;
    }
    while signal.changed().await.is_ok() {
        if *signal.borrow() {
            return;
        }
    }
    std::future::pending::<()>().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::cache::CacheConfig;
    use crate::app::geometry::CropAnchor;
    use image::{Rgba, RgbaImage};
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::time::timeout;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let bitmap = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            width,
            height,
            Rgba([10, 200, 30, 255]),
        ));
        codec::encode_png(&bitmap).unwrap()
    }

    async fn context_in(temp: &TempDir, max_concurrency: usize) -> RequestContext {
        RequestContext {
            scheduler: Arc::new(FetchScheduler::new(max_concurrency)),
            store: Arc::new(
                CacheStore::new(CacheConfig::with_cache_root(temp.path().join("cache")))
                    .await
                    .unwrap(),
            ),
            client: Arc::new(HttpClient::new().unwrap()),
        }
    }

    async fn write_source(dir: &Path, name: &str, width: u32, height: u32) -> SourceLocator {
        let path = dir.join(name);
        tokio::fs::write(&path, png_bytes(width, height)).await.unwrap();
        SourceLocator::from_path(path)
    }

    fn cover_options(width: f64, height: f64) -> LoadOptions {
        let mut options = LoadOptions::default().with_target(width, height);
        options.fit.fit_from_outside = true;
        options.fit.crop_anchor = CropAnchor::TopCenter;
        options
    }

    async fn completed(handle: &mut LoadHandle) -> LoadCompletion {
        timeout(Duration::from_secs(5), handle.completion())
            .await
            .expect("request should reach a terminal state")
    }

    #[tokio::test]
    async fn test_local_file_load_transforms_and_caches() {
        let temp = TempDir::new().unwrap();
        let ctx = context_in(&temp, 2).await;
        let locator = write_source(temp.path(), "photo.png", 200, 400).await;

        let mut handle = spawn(
            RequestSource::Remote(locator.clone()),
            cover_options(100.0, 100.0),
            ctx.clone(),
        );
        let completion = completed(&mut handle).await;

        let delivery = completion.delivery().expect("should deliver");
        assert_eq!(delivery.final_size, (100, 100));
        assert!(!delivery.from_cache);
        assert!(delivery.animate);
        assert_eq!(handle.state(), LoadState::Delivered);

        // Both the full-size artifact and the thumbnail variant are cached.
        let full = key::derive_key(&locator, ScaleHint::X1, None);
        let thumb = key::derive_key(&locator, ScaleHint::X1, Some((100, 100)));
        assert!(ctx.store.exists(&full).await);
        assert!(ctx.store.exists(&thumb).await);
    }

    #[tokio::test]
    async fn test_second_load_hits_cache() {
        let temp = TempDir::new().unwrap();
        let ctx = context_in(&temp, 2).await;
        let locator = write_source(temp.path(), "photo.png", 200, 400).await;

        let mut first = spawn(
            RequestSource::Remote(locator.clone()),
            cover_options(100.0, 100.0),
            ctx.clone(),
        );
        assert!(completed(&mut first).await.is_delivered());

        let mut second = spawn(
            RequestSource::Remote(locator),
            cover_options(100.0, 100.0),
            ctx.clone(),
        );
        let delivery = completed(&mut second).await.delivery().unwrap();
        assert!(delivery.from_cache);
        assert_eq!(delivery.final_size, (100, 100));
    }

    #[tokio::test]
    async fn test_cache_hit_can_skip_animation() {
        let temp = TempDir::new().unwrap();
        let ctx = context_in(&temp, 2).await;
        let locator = write_source(temp.path(), "photo.png", 64, 64).await;

        let mut options = LoadOptions::default();
        options.skip_animation_from_cache = true;

        let mut first = spawn(
            RequestSource::Remote(locator.clone()),
            options.clone(),
            ctx.clone(),
        );
        let fetched = completed(&mut first).await.delivery().unwrap();
        assert!(fetched.animate);

        let mut second = spawn(RequestSource::Remote(locator), options, ctx.clone());
        let cached = completed(&mut second).await.delivery().unwrap();
        assert!(cached.from_cache);
        assert!(!cached.animate);
    }

    #[tokio::test]
    async fn test_size_known_event_fires_before_completion() {
        let temp = TempDir::new().unwrap();
        let ctx = context_in(&temp, 2).await;
        let locator = write_source(temp.path(), "photo.png", 320, 240).await;

        let mut handle = spawn(
            RequestSource::Remote(locator),
            LoadOptions::default(),
            ctx,
        );
        assert!(completed(&mut handle).await.is_delivered());
        assert_eq!(
            handle.try_event(),
            Some(LoadEvent::SizeKnown {
                width: 320,
                height: 240
            })
        );
    }

    #[tokio::test]
    async fn test_decode_failure_fails_terminally() {
        let temp = TempDir::new().unwrap();
        let ctx = context_in(&temp, 2).await;
        let path = temp.path().join("broken.png");
        tokio::fs::write(&path, b"not a png at all").await.unwrap();

        let mut handle = spawn(
            RequestSource::Remote(SourceLocator::from_path(path)),
            LoadOptions::default(),
            ctx,
        );
        let completion = completed(&mut handle).await;
        assert!(matches!(completion.error(), Some(LoadError::Decode(_))));
        assert_eq!(handle.state(), LoadState::Failed);
    }

    #[tokio::test]
    async fn test_missing_file_fails_with_network_error() {
        let temp = TempDir::new().unwrap();
        let ctx = context_in(&temp, 2).await;

        let mut handle = spawn(
            RequestSource::Remote(SourceLocator::from_path(temp.path().join("absent.png"))),
            LoadOptions::default(),
            ctx,
        );
        let completion = completed(&mut handle).await;
        assert!(matches!(completion.error(), Some(LoadError::Network(_))));
    }

    #[tokio::test]
    async fn test_deferred_load_waits_for_activation() {
        let temp = TempDir::new().unwrap();
        let ctx = context_in(&temp, 2).await;
        let locator = write_source(temp.path(), "photo.png", 64, 64).await;

        let mut options = LoadOptions::default();
        options.defer_load = true;

        let mut handle = spawn(RequestSource::Remote(locator), options, ctx);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(handle.state(), LoadState::Idle);

        handle.activate_load();
        assert!(completed(&mut handle).await.is_delivered());
    }

    #[tokio::test]
    async fn test_deferred_display_holds_ready_result() {
        let temp = TempDir::new().unwrap();
        let ctx = context_in(&temp, 2).await;
        let locator = write_source(temp.path(), "photo.png", 64, 64).await;

        let mut options = LoadOptions::default();
        options.defer_display = true;

        let mut handle = spawn(RequestSource::Remote(locator), options, ctx);
        tokio::time::sleep(Duration::from_millis(100)).await;
        // The bitmap is ready but held short of delivery.
        assert!(!handle.state().is_terminal());

        handle.activate_display();
        assert!(completed(&mut handle).await.is_delivered());
    }

    #[tokio::test]
    async fn test_cancel_while_deferred_invokes_no_hook() {
        let temp = TempDir::new().unwrap();
        let ctx = context_in(&temp, 2).await;
        let locator = write_source(temp.path(), "photo.png", 64, 64).await;

        let mut options = LoadOptions::default();
        options.defer_load = true;

        let mut handle = spawn(RequestSource::Remote(locator), options, ctx.clone());
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.cancel();

        let completion = completed(&mut handle).await;
        assert!(completion.is_cancelled());
        assert_eq!(handle.state(), LoadState::Cancelled);
        // Nothing was fetched or cached.
        assert_eq!(ctx.store.stats().await.artifact_count, 0);
    }

    #[tokio::test]
    async fn test_bitmap_source_runs_transform_tail_only() {
        let temp = TempDir::new().unwrap();
        let ctx = context_in(&temp, 2).await;
        let bitmap = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            200,
            400,
            Rgba([1, 2, 3, 255]),
        ));

        let mut handle = spawn(
            RequestSource::Bitmap(bitmap),
            cover_options(100.0, 100.0),
            ctx.clone(),
        );
        let delivery = completed(&mut handle).await.delivery().unwrap();
        assert_eq!(delivery.final_size, (100, 100));
        assert!(!delivery.from_cache);
        // No locator means nothing to cache and no scheduler traffic.
        assert_eq!(ctx.store.stats().await.artifact_count, 0);
        assert_eq!(ctx.scheduler.total_count().await, 0);
    }

    #[tokio::test]
    async fn test_resize_disabled_delivers_natural_size() {
        let temp = TempDir::new().unwrap();
        let ctx = context_in(&temp, 2).await;
        let locator = write_source(temp.path(), "photo.png", 200, 400).await;

        let mut options = cover_options(100.0, 100.0);
        options.resize_images = false;

        let mut handle = spawn(RequestSource::Remote(locator), options, ctx);
        let delivery = completed(&mut handle).await.delivery().unwrap();
        assert_eq!(delivery.final_size, (200, 400));
    }

    #[tokio::test]
    async fn test_density_variant_discovered_for_local_files() {
        let temp = TempDir::new().unwrap();
        let ctx = context_in(&temp, 2).await;
        // Only the @2x sibling exists at double resolution.
        let _variant = write_source(temp.path(), "icon@2x.png", 128, 128).await;
        let requested = SourceLocator::from_path(temp.path().join("icon.png"));

        let mut handle = spawn(
            RequestSource::Remote(requested.clone()),
            LoadOptions::default(),
            ctx.clone(),
        );
        let delivery = completed(&mut handle).await.delivery().unwrap();
        assert_eq!(delivery.final_size, (128, 128));

        // The cache key follows the resolved variant locator.
        let variant_locator = requested.with_density_marker("@2x").unwrap();
        let variant_key = key::derive_key(&variant_locator, ScaleHint::X2, None);
        assert!(ctx.store.exists(&variant_key).await);
    }

    #[tokio::test]
    async fn test_disabled_cache_still_delivers() {
        let temp = TempDir::new().unwrap();
        let mut config = CacheConfig::with_cache_root(temp.path().join("cache"));
        config.enabled = false;
        let ctx = RequestContext {
            scheduler: Arc::new(FetchScheduler::new(2)),
            store: Arc::new(CacheStore::new(config).await.unwrap()),
            client: Arc::new(HttpClient::new().unwrap()),
        };
        let locator = write_source(temp.path(), "photo.png", 64, 64).await;

        let mut handle = spawn(
            RequestSource::Remote(locator),
            cover_options(32.0, 32.0),
            ctx.clone(),
        );
        let delivery = completed(&mut handle).await.delivery().unwrap();
        assert_eq!(delivery.final_size, (32, 32));
        assert_eq!(ctx.store.stats().await.artifact_count, 0);
    }
}
