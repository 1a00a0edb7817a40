//! Periodic snapshot refresh and background image cache.

use crate::remote::{Raster, RemoteError, RemoteRequest, RemoteResult};
use crate::scene::LayoutSnapshot;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

// Use web_time for WASM compatibility
#[cfg(target_arch = "wasm32")]
use web_time::Instant;
#[cfg(not(target_arch = "wasm32"))]
use std::time::Instant;

/// Sync status shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SyncStatus {
    #[default]
    Syncing,
    Live,
    Error,
    /// Last search matched this item.
    Found(String),
    /// Last search matched nothing.
    NotFound,
    SessionExpired,
}

impl SyncStatus {
    /// Whether this status reports a search result.
    pub fn is_search(&self) -> bool {
        matches!(self, SyncStatus::Found(_) | SyncStatus::NotFound)
    }

    pub fn label(&self) -> String {
        match self {
            SyncStatus::Syncing => "Syncing...".to_string(),
            SyncStatus::Live => "Live".to_string(),
            SyncStatus::Error => "Sync Error".to_string(),
            SyncStatus::Found(name) => format!("Found: {name}"),
            SyncStatus::NotFound => "Project not found".to_string(),
            SyncStatus::SessionExpired => "Session expired".to_string(),
        }
    }
}

/// Load state of one background image.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageEntry {
    Loading,
    Loaded(Arc<Raster>),
    /// Load failed. Never retried.
    Failed,
}

/// Background rasters keyed by image path.
#[derive(Debug, Clone, Default)]
pub struct ImageCache {
    entries: HashMap<String, ImageEntry>,
}

impl ImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<&ImageEntry> {
        self.entries.get(path)
    }

    /// Decoded raster for a path, if it loaded.
    pub fn loaded(&self, path: &str) -> Option<Arc<Raster>> {
        match self.entries.get(path) {
            Some(ImageEntry::Loaded(raster)) => Some(raster.clone()),
            _ => None,
        }
    }

    /// Whether a load for `path` has finished, successfully or not.
    pub fn is_settled(&self, path: &str) -> bool {
        matches!(self.entries.get(path), Some(ImageEntry::Loaded(_) | ImageEntry::Failed))
    }

    fn mark_loading(&mut self, path: &str) {
        self.entries.insert(path.to_string(), ImageEntry::Loading);
    }

    fn forget(&mut self, path: &str) {
        self.entries.remove(path);
    }

    fn settle(&mut self, path: &str, result: RemoteResult<Raster>) {
        let entry = match result {
            Ok(raster) => ImageEntry::Loaded(Arc::new(raster)),
            Err(e) => {
                log::warn!("Background image {path} failed to load: {e}");
                ImageEntry::Failed
            }
        };
        self.entries.insert(path.to_string(), entry);
    }
}

/// What to do with a completed layout fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// Apply this snapshot now.
    Ready(LayoutSnapshot),
    /// Held until its background image settles.
    Deferred,
    Failed(RemoteError),
}

/// Drives periodic and on-demand layout fetches.
///
/// Fetches may overlap; each completed fetch is applied in arrival order, so
/// whichever completes last wins.
#[derive(Debug)]
pub struct RefreshLoop {
    interval: Duration,
    last_started: Option<Instant>,
    forced: bool,
    stopped: bool,
    in_flight: usize,
    images: ImageCache,
    /// Latest snapshot waiting on its background image.
    deferred: Option<LayoutSnapshot>,
}

impl RefreshLoop {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_started: None,
            forced: false,
            stopped: false,
            in_flight: 0,
            images: ImageCache::new(),
            deferred: None,
        }
    }

    pub fn images(&self) -> &ImageCache {
        &self.images
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Ask for a fetch at the next poll regardless of the interval.
    pub fn request(&mut self) {
        self.forced = true;
    }

    /// Stop issuing fetches until [`resume`](Self::resume).
    pub fn stop(&mut self) {
        if !self.stopped {
            log::debug!("Refresh loop stopped");
        }
        self.stopped = true;
        self.forced = false;
    }

    /// Resume and fetch at the next poll.
    pub fn resume(&mut self) {
        self.stopped = false;
        self.forced = true;
    }

    /// Issue a fetch if one is due.
    pub fn poll(&mut self, now: Instant) -> Option<RemoteRequest> {
        if self.stopped {
            return None;
        }
        let due = self.forced
            || self
                .last_started
                .is_none_or(|last| now.saturating_duration_since(last) >= self.interval);
        if !due {
            return None;
        }
        self.forced = false;
        self.last_started = Some(now);
        self.in_flight += 1;
        Some(RemoteRequest::FetchLayout)
    }

    /// Time until the next periodic fetch is due.
    pub fn next_due(&self, now: Instant) -> Duration {
        if self.forced {
            return Duration::ZERO;
        }
        match self.last_started {
            Some(last) => self.interval.saturating_sub(now.saturating_duration_since(last)),
            None => Duration::ZERO,
        }
    }

    /// Handle a completed layout fetch. May ask for a background image load.
    pub fn on_layout(&mut self, result: RemoteResult<LayoutSnapshot>) -> (RefreshOutcome, Option<RemoteRequest>) {
        self.in_flight = self.in_flight.saturating_sub(1);
        let snapshot = match result {
            Ok(snapshot) => snapshot,
            Err(e) => return (RefreshOutcome::Failed(e), None),
        };
        let Some(path) = snapshot.background_path().map(str::to_string) else {
            self.deferred = None;
            return (RefreshOutcome::Ready(snapshot), None);
        };
        match self.images.get(&path) {
            Some(ImageEntry::Loaded(_) | ImageEntry::Failed) => {
                self.deferred = None;
                (RefreshOutcome::Ready(snapshot), None)
            }
            Some(ImageEntry::Loading) => {
                self.deferred = Some(snapshot);
                (RefreshOutcome::Deferred, None)
            }
            None => {
                log::debug!("Loading background image {path}");
                self.images.mark_loading(&path);
                self.deferred = Some(snapshot);
                (RefreshOutcome::Deferred, Some(RemoteRequest::FetchImage { path }))
            }
        }
    }

    /// Drop an image load cut short by an expired session. The next snapshot
    /// naming `path` asks for it again.
    pub fn abandon_image(&mut self, path: &str) {
        self.images.forget(path);
        self.deferred = None;
    }

    /// Handle a completed image load. Returns the deferred snapshot once its
    /// background has settled.
    pub fn on_image(&mut self, path: &str, result: RemoteResult<Raster>) -> Option<LayoutSnapshot> {
        self.images.settle(path, result);
        let ready = self
            .deferred
            .as_ref()
            .and_then(LayoutSnapshot::background_path)
            .is_none_or(|p| self.images.is_settled(p));
        if ready { self.deferred.take() } else { None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Background, Item};

    fn snapshot_with_bg(path: &str, item: &str) -> LayoutSnapshot {
        LayoutSnapshot {
            background: Some(Background {
                image_path: Some(path.to_string()),
                ..Background::default()
            }),
            items: vec![Item::project(item, 0.0, 0.0)],
        }
    }

    #[test]
    fn test_poll_respects_interval() {
        let mut refresh = RefreshLoop::new(Duration::from_secs(10));
        let t0 = Instant::now();
        assert_eq!(refresh.poll(t0), Some(RemoteRequest::FetchLayout));
        assert_eq!(refresh.poll(t0 + Duration::from_secs(5)), None);
        assert_eq!(refresh.next_due(t0 + Duration::from_secs(4)), Duration::from_secs(6));
        assert_eq!(refresh.poll(t0 + Duration::from_secs(10)), Some(RemoteRequest::FetchLayout));
        assert_eq!(refresh.in_flight(), 2);
    }

    #[test]
    fn test_forced_request_overlaps_periodic() {
        let mut refresh = RefreshLoop::new(Duration::from_secs(10));
        let t0 = Instant::now();
        refresh.poll(t0);
        refresh.request();
        assert_eq!(refresh.poll(t0 + Duration::from_millis(10)), Some(RemoteRequest::FetchLayout));
        assert_eq!(refresh.in_flight(), 2);
    }

    #[test]
    fn test_stop_and_resume() {
        let mut refresh = RefreshLoop::new(Duration::from_secs(10));
        let t0 = Instant::now();
        refresh.stop();
        refresh.request();
        assert_eq!(refresh.poll(t0), None);
        refresh.resume();
        assert_eq!(refresh.poll(t0), Some(RemoteRequest::FetchLayout));
    }

    #[test]
    fn test_failed_fetch() {
        let mut refresh = RefreshLoop::new(Duration::from_secs(10));
        refresh.poll(Instant::now());
        let (outcome, follow_up) = refresh.on_layout(Err(RemoteError::Network("down".into())));
        assert!(matches!(outcome, RefreshOutcome::Failed(_)));
        assert!(follow_up.is_none());
        assert_eq!(refresh.in_flight(), 0);
    }

    #[test]
    fn test_uncached_background_defers_until_loaded() {
        let mut refresh = RefreshLoop::new(Duration::from_secs(10));
        let (outcome, follow_up) = refresh.on_layout(Ok(snapshot_with_bg("floor.png", "A1")));
        assert_eq!(outcome, RefreshOutcome::Deferred);
        assert_eq!(follow_up, Some(RemoteRequest::FetchImage { path: "floor.png".into() }));

        // A newer snapshot arriving while loading replaces the deferred one.
        let (outcome, follow_up) = refresh.on_layout(Ok(snapshot_with_bg("floor.png", "B2")));
        assert_eq!(outcome, RefreshOutcome::Deferred);
        assert!(follow_up.is_none());

        let raster = Raster::new(1, 1, vec![0; 4]).unwrap();
        let ready = refresh.on_image("floor.png", Ok(raster)).unwrap();
        assert_eq!(ready.items[0].name, "B2");
        assert!(refresh.images().loaded("floor.png").is_some());

        let (outcome, _) = refresh.on_layout(Ok(snapshot_with_bg("floor.png", "C3")));
        assert!(matches!(outcome, RefreshOutcome::Ready(_)));
    }

    #[test]
    fn test_failed_image_is_cached_and_not_retried() {
        let mut refresh = RefreshLoop::new(Duration::from_secs(10));
        refresh.on_layout(Ok(snapshot_with_bg("broken.png", "A1")));
        let ready = refresh.on_image("broken.png", Err(RemoteError::Decode("bad png".into())));
        assert!(ready.is_some());
        assert_eq!(refresh.images().get("broken.png"), Some(&ImageEntry::Failed));

        let (outcome, follow_up) = refresh.on_layout(Ok(snapshot_with_bg("broken.png", "A1")));
        assert!(matches!(outcome, RefreshOutcome::Ready(_)));
        assert!(follow_up.is_none());
    }

    #[test]
    fn test_abandoned_image_is_requested_again() {
        let mut refresh = RefreshLoop::new(Duration::from_secs(10));
        refresh.on_layout(Ok(snapshot_with_bg("floor.png", "A1")));
        refresh.abandon_image("floor.png");
        assert!(refresh.images().get("floor.png").is_none());

        let (outcome, follow_up) = refresh.on_layout(Ok(snapshot_with_bg("floor.png", "A1")));
        assert_eq!(outcome, RefreshOutcome::Deferred);
        assert_eq!(follow_up, Some(RemoteRequest::FetchImage { path: "floor.png".into() }));
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(SyncStatus::Found("P-1".into()).label(), "Found: P-1");
        assert!(SyncStatus::NotFound.is_search());
        assert!(!SyncStatus::Live.is_search());
    }
}
