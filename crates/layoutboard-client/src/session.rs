//! Headless session: drives a [`Board`] against a layout service.
//!
//! Requests run as local tasks on the current thread and report back over a
//! channel, so the board itself is only ever touched from the session loop.

use std::rc::Rc;
use std::time::{Duration, Instant};

use kurbo::Size;
use layoutboard_core::remote::{BoxFuture, LayoutService, RemoteRequest, RemoteResponse, execute};
use layoutboard_core::{Board, BoardConfig, Effect, MemoryLayoutService, SyncStatus, Viewer};
use layoutboard_render::{FrameBuilder, FrameStats, RenderContext, Renderer, StatsRenderer};
use tokio::sync::mpsc;

use crate::error::{ClientError, Result};
use crate::http::HttpLayoutService;

/// Upper bound on one idle wait, so a stopped refresh loop never spins.
const IDLE_WAIT: Duration = Duration::from_secs(60);

/// A layout service that can re-establish an expired session.
pub trait Reauthenticate: LayoutService {
    /// Try to log in again. Resolves to `false` when that is not possible.
    fn reauthenticate(&self) -> BoxFuture<'_, bool>;
}

impl Reauthenticate for HttpLayoutService {
    fn reauthenticate(&self) -> BoxFuture<'_, bool> {
        Box::pin(async move {
            match self.relogin().await {
                Ok(viewer) => {
                    log::info!("Re-established session for {}", viewer.name);
                    true
                }
                Err(e) => {
                    log::error!("Could not re-establish session: {e}");
                    false
                }
            }
        })
    }
}

impl Reauthenticate for MemoryLayoutService {
    fn reauthenticate(&self) -> BoxFuture<'_, bool> {
        Box::pin(async { false })
    }
}

enum Event {
    Response(RemoteResponse),
    Reauthenticated(bool),
}

/// What a finished session saw last.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub frames: u64,
    pub last: FrameStats,
    pub status: SyncStatus,
}

pub struct Session<S> {
    board: Board,
    service: Rc<S>,
    renderer: StatsRenderer,
    viewport: Size,
    once: bool,
    dirty: bool,
    reauthenticating: bool,
    shown_status: Option<SyncStatus>,
    tx: mpsc::UnboundedSender<Event>,
    rx: mpsc::UnboundedReceiver<Event>,
}

impl<S: Reauthenticate + 'static> Session<S> {
    pub fn new(service: S, viewer: Viewer, config: BoardConfig, viewport: Size) -> Self {
        let mut board = Board::new(config, viewer);
        board.controller_mut().resize(viewport.width, viewport.height);
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            board,
            service: Rc::new(service),
            renderer: StatsRenderer::new(),
            viewport,
            once: false,
            dirty: true,
            reauthenticating: false,
            shown_status: None,
            tx,
            rx,
        }
    }

    /// Stop after the first frame that reflects a finished refresh.
    pub fn once(mut self, once: bool) -> Self {
        self.once = once;
        self
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Run until `once` is satisfied or the session is lost.
    ///
    /// Must be polled inside a [`tokio::task::LocalSet`].
    pub async fn run(mut self) -> Result<SessionSummary> {
        loop {
            let now = Instant::now();
            for request in self.board.poll(now) {
                self.spawn(request);
            }
            self.handle_effects();

            if self.dirty || self.shown_status.as_ref() != Some(self.board.controller().status()) {
                self.render();
                if self.once && matches!(self.board.controller().status(), SyncStatus::Live | SyncStatus::Error) {
                    return Ok(self.summary());
                }
            }

            let wait = if self.board.refresh_loop().is_stopped() {
                IDLE_WAIT
            } else {
                self.board.next_wakeup(now).min(IDLE_WAIT)
            };

            tokio::select! {
                event = self.rx.recv() => match event {
                    Some(Event::Response(response)) => {
                        if let Some(follow_up) = self.board.deliver(response) {
                            self.spawn(follow_up);
                        }
                    }
                    Some(Event::Reauthenticated(true)) => {
                        self.reauthenticating = false;
                        self.board.resume_session();
                    }
                    Some(Event::Reauthenticated(false)) => return Err(ClientError::SessionExpired),
                    // The session keeps a sender, so the channel never closes.
                    None => return Ok(self.summary()),
                },
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    fn spawn(&self, request: RemoteRequest) {
        log::debug!("Running {request:?}");
        let service = Rc::clone(&self.service);
        let tx = self.tx.clone();
        tokio::task::spawn_local(async move {
            let response = execute(&*service, request).await;
            // The receiver only goes away when the session ends.
            let _ = tx.send(Event::Response(response));
        });
    }

    fn handle_effects(&mut self) {
        for effect in self.board.take_effects() {
            match effect {
                Effect::Redraw => self.dirty = true,
                Effect::Alert(message) => log::warn!("{message}"),
                Effect::ConfirmRemoval { name } => {
                    log::info!("Declining removal of {name} (no interactive prompt)");
                    // Cancelling resets the mode; the error only reports a stale prompt.
                    if let Err(e) = self.board.controller_mut().confirm_removal(&name, false) {
                        log::debug!("Removal prompt for {name} already resolved: {e}");
                    }
                }
                Effect::OpenAddSelector { at } => {
                    log::info!("Add selector requested at ({:.0}, {:.0}); cancelling", at.x, at.y);
                    self.board.controller_mut().cancel_add();
                }
                Effect::ShowAddable(names) => log::info!("{} items can be added", names.len()),
                Effect::OpenInspection { item, .. } => log::info!("Inspecting {}", item.name),
                Effect::RefreshInspection { item, .. } => log::debug!("Inspection of {} refreshed", item.name),
                Effect::CloseInspection => log::debug!("Inspection closed"),
                Effect::SessionExpired => self.start_reauthentication(),
            }
        }
    }

    fn start_reauthentication(&mut self) {
        if self.reauthenticating {
            return;
        }
        self.reauthenticating = true;
        let service = Rc::clone(&self.service);
        let tx = self.tx.clone();
        tokio::task::spawn_local(async move {
            let ok = service.reauthenticate().await;
            let _ = tx.send(Event::Reauthenticated(ok));
        });
    }

    fn render(&mut self) {
        let controller = self.board.controller();
        let frame = FrameBuilder::new(controller.scene(), controller.view(), controller.flags())
            .with_images(self.board.images())
            .with_viewport(self.viewport)
            .build();
        self.renderer.build_scene(&RenderContext::new(&frame));

        let stats = self.renderer.last();
        let status = controller.status().clone();
        log::info!(
            "[{}] {} items, {} overlays, background {} (zoom {}%)",
            status.label(),
            stats.items,
            stats.overlays,
            if frame.has_background { "shown" } else { "absent" },
            controller.zoom_percent(),
        );
        self.shown_status = Some(status);
        self.dirty = false;
    }

    fn summary(&self) -> SessionSummary {
        SessionSummary {
            frames: self.renderer.frames(),
            last: self.renderer.last(),
            status: self.board.controller().status().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use layoutboard_core::remote::{Raster, RemoteError, RemoteResult};
    use layoutboard_core::{Action, Background, Item, LayoutSnapshot};
    use std::cell::Cell;
    use tokio::task::LocalSet;

    fn run_local<F: std::future::Future>(future: F) -> F::Output {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        LocalSet::new().block_on(&runtime, future)
    }

    fn snapshot() -> LayoutSnapshot {
        LayoutSnapshot {
            background: None,
            items: vec![
                Item::project("A1", 0.0, 0.0),
                Item::project("B2", 400.0, 0.0).with_owner("bob"),
            ],
        }
    }

    /// Memory service whose login can be switched on.
    struct Relogin {
        inner: MemoryLayoutService,
        accept: bool,
        attempts: Cell<u32>,
    }

    impl LayoutService for Relogin {
        fn fetch_layout(&self) -> BoxFuture<'_, RemoteResult<LayoutSnapshot>> {
            self.inner.fetch_layout()
        }
        fn fetch_image(&self, path: &str) -> BoxFuture<'_, RemoteResult<Raster>> {
            self.inner.fetch_image(path)
        }
        fn list_addable(&self) -> BoxFuture<'_, RemoteResult<Vec<String>>> {
            self.inner.list_addable()
        }
        fn apply(&self, action: &Action) -> BoxFuture<'_, RemoteResult<()>> {
            self.inner.apply(action)
        }
    }

    impl Reauthenticate for Relogin {
        fn reauthenticate(&self) -> BoxFuture<'_, bool> {
            self.attempts.set(self.attempts.get() + 1);
            Box::pin(async move { self.accept })
        }
    }

    #[test]
    fn test_once_renders_first_snapshot() {
        let service = MemoryLayoutService::with_snapshot(snapshot());
        let session = Session::new(service, Viewer::admin("alice"), BoardConfig::default(), Size::new(800.0, 600.0))
            .once(true);
        let summary = run_local(session.run()).unwrap();
        assert_eq!(summary.status, SyncStatus::Live);
        assert_eq!(summary.last.items, 2);
        // Default mode draws no removal overlays.
        assert_eq!(summary.last.overlays, 0);
        assert!(summary.frames >= 1);
    }

    #[test]
    fn test_once_reports_refresh_error() {
        let service = MemoryLayoutService::with_snapshot(snapshot());
        service.fail_all(RemoteError::Network("connection refused".into()));
        let session = Session::new(service, Viewer::member("guest"), BoardConfig::default(), Size::new(800.0, 600.0))
            .once(true);
        let summary = run_local(session.run()).unwrap();
        assert_eq!(summary.status, SyncStatus::Error);
        assert_eq!(summary.last.items, 0);
    }

    #[test]
    fn test_background_image_is_loaded_before_render() {
        let mut layout = snapshot();
        layout.background = Some(Background {
            image_path: Some("floor.png".into()),
            ..Background::default()
        });
        let service = MemoryLayoutService::with_snapshot(layout);
        service.insert_image("floor.png", Raster::new(2, 2, vec![255; 16]).unwrap());
        let session = Session::new(service, Viewer::member("guest"), BoardConfig::default(), Size::new(800.0, 600.0))
            .once(true);
        let summary = run_local(session.run()).unwrap();
        assert_eq!(summary.status, SyncStatus::Live);
        assert_eq!(summary.last.images, 1);
    }

    #[test]
    fn test_expired_session_without_login_ends_run() {
        let service = MemoryLayoutService::with_snapshot(snapshot());
        service.fail_next(RemoteError::Unauthorized);
        let session = Session::new(service, Viewer::admin("alice"), BoardConfig::default(), Size::new(800.0, 600.0))
            .once(true);
        assert!(matches!(run_local(session.run()), Err(ClientError::SessionExpired)));
    }

    #[test]
    fn test_expired_session_resumes_after_login() {
        let inner = MemoryLayoutService::with_snapshot(snapshot());
        inner.fail_next(RemoteError::Unauthorized);
        let service = Relogin {
            inner,
            accept: true,
            attempts: Cell::new(0),
        };
        let session = Session::new(service, Viewer::admin("alice"), BoardConfig::default(), Size::new(800.0, 600.0))
            .once(true);
        let service = Rc::clone(&session.service);
        let summary = run_local(session.run()).unwrap();
        assert_eq!(summary.status, SyncStatus::Live);
        assert_eq!(summary.last.items, 2);
        assert_eq!(service.attempts.get(), 1);
    }
}
