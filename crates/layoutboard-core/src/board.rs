//! The board: interaction controller plus refresh loop behind one interface.

use crate::config::BoardConfig;
use crate::controller::{Effect, InteractionController};
use crate::permission::Viewer;
use crate::refresh::{ImageCache, RefreshLoop, RefreshOutcome};
use crate::remote::{RemoteReply, RemoteRequest, RemoteResponse};
use std::time::Duration;

// Use web_time for WASM compatibility
#[cfg(target_arch = "wasm32")]
use web_time::Instant;
#[cfg(not(target_arch = "wasm32"))]
use std::time::Instant;

/// Everything a host needs to drive one layout board.
///
/// The host calls [`poll`](Board::poll) on every turn of its event loop,
/// executes the returned requests and hands each result back through
/// [`deliver`](Board::deliver).
#[derive(Debug)]
pub struct Board {
    controller: InteractionController,
    refresh: RefreshLoop,
}

impl Board {
    pub fn new(config: BoardConfig, viewer: Viewer) -> Self {
        let refresh = RefreshLoop::new(config.refresh_interval);
        Self {
            controller: InteractionController::new(config, viewer),
            refresh,
        }
    }

    pub fn controller(&self) -> &InteractionController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut InteractionController {
        &mut self.controller
    }

    pub fn images(&self) -> &ImageCache {
        self.refresh.images()
    }

    pub fn refresh_loop(&self) -> &RefreshLoop {
        &self.refresh
    }

    /// Ask for a refresh at the next poll.
    pub fn request_refresh(&mut self) {
        self.refresh.request();
    }

    /// Advance timers and collect remote work to run now.
    pub fn poll(&mut self, now: Instant) -> Vec<RemoteRequest> {
        self.controller.tick(now);

        let mut out = Vec::new();
        for request in self.controller.take_requests() {
            match request {
                RemoteRequest::FetchLayout => self.refresh.request(),
                other => out.push(other),
            }
        }

        if self.controller.is_session_expired() {
            self.refresh.stop();
        } else if self.refresh.is_stopped() {
            self.refresh.resume();
        }

        if let Some(fetch) = self.refresh.poll(now) {
            self.controller.refresh_started();
            out.push(fetch);
        }
        out
    }

    /// How long the host may sleep before the next poll is useful.
    pub fn next_wakeup(&self, now: Instant) -> Duration {
        self.refresh.next_due(now)
    }

    /// Route a completed request. Returns follow-up work, if any.
    pub fn deliver(&mut self, response: RemoteResponse) -> Option<RemoteRequest> {
        let RemoteResponse { request, result } = response;
        match request {
            RemoteRequest::FetchLayout => {
                let result = result.and_then(|reply| match reply {
                    RemoteReply::Layout(snapshot) => Ok(snapshot),
                    other => Err(crate::remote::RemoteError::Decode(format!(
                        "expected layout, got {other:?}"
                    ))),
                });
                let (outcome, follow_up) = self.refresh.on_layout(result);
                match outcome {
                    RefreshOutcome::Ready(snapshot) => self.controller.apply_refresh(snapshot),
                    RefreshOutcome::Deferred => {}
                    RefreshOutcome::Failed(e) => self.controller.refresh_failed(&e),
                }
                follow_up
            }
            RemoteRequest::FetchImage { path } => {
                let result = result.and_then(|reply| match reply {
                    RemoteReply::Image(raster) => Ok(raster),
                    other => Err(crate::remote::RemoteError::Decode(format!(
                        "expected image, got {other:?}"
                    ))),
                });
                if let Err(e) = &result {
                    if e.is_session_expired() {
                        self.refresh.abandon_image(&path);
                        self.controller.refresh_failed(e);
                        return None;
                    }
                }
                match self.refresh.on_image(&path, result) {
                    Some(snapshot) => self.controller.apply_refresh(snapshot),
                    None => self.controller.background_settled(),
                }
                None
            }
            request @ (RemoteRequest::ListAddable | RemoteRequest::Apply(_)) => {
                self.controller.handle_response(RemoteResponse { request, result });
                None
            }
        }
    }

    /// Drain UI effects.
    pub fn take_effects(&mut self) -> Vec<Effect> {
        self.controller.take_effects()
    }

    /// The authentication collaborator restored the session.
    pub fn resume_session(&mut self) {
        self.controller.resume_session();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Action;
    use crate::controller::Mode;
    use crate::input::{MouseButton, PointerEvent};
    use crate::refresh::{ImageEntry, SyncStatus};
    use crate::remote::{MemoryLayoutService, Raster, RemoteError, block_on, execute};
    use crate::scene::{Background, Item, LayoutSnapshot, Priority};
    use kurbo::Point;

    fn service() -> MemoryLayoutService {
        MemoryLayoutService::with_snapshot(LayoutSnapshot {
            background: None,
            items: vec![
                Item::project("A1", 0.0, 0.0),
                Item::project("B2", 400.0, 0.0).with_owner("alice"),
            ],
        })
    }

    /// Run every pending request to completion.
    fn pump(board: &mut Board, service: &MemoryLayoutService, now: Instant) {
        let mut queue = board.poll(now);
        while let Some(request) = queue.pop() {
            let response = block_on(execute(service, request));
            if let Some(follow_up) = board.deliver(response) {
                queue.push(follow_up);
            }
            queue.extend(board.poll(now));
        }
    }

    fn fetches(service: &MemoryLayoutService) -> usize {
        service
            .calls()
            .iter()
            .filter(|c| **c == RemoteRequest::FetchLayout)
            .count()
    }

    #[test]
    fn test_initial_load_goes_live() {
        let service = service();
        let mut board = Board::new(BoardConfig::default(), Viewer::admin("alice"));
        pump(&mut board, &service, Instant::now());
        assert_eq!(board.controller().scene().len(), 2);
        assert_eq!(board.controller().status(), &SyncStatus::Live);
    }

    #[test]
    fn test_periodic_refresh_picks_up_remote_changes() {
        let service = service();
        let mut board = Board::new(BoardConfig::default(), Viewer::admin("alice"));
        let t0 = Instant::now();
        pump(&mut board, &service, t0);

        let mut snapshot = service.snapshot();
        snapshot.items[0].priority = Some(Priority::High);
        service.set_snapshot(snapshot);

        pump(&mut board, &service, t0 + Duration::from_secs(5));
        assert_eq!(board.controller().scene().get("A1").unwrap().priority, None);
        pump(&mut board, &service, t0 + Duration::from_secs(10));
        assert_eq!(board.controller().scene().get("A1").unwrap().priority, Some(Priority::High));
    }

    #[test]
    fn test_drag_persists_and_refreshes() {
        let service = service();
        let mut board = Board::new(BoardConfig::default(), Viewer::admin("alice"));
        let now = Instant::now();
        pump(&mut board, &service, now);

        let c = board.controller_mut();
        c.toggle_mode(Mode::Move).unwrap();
        c.handle_pointer(PointerEvent::Down { position: Point::new(10.0, 10.0), button: MouseButton::Left });
        c.handle_pointer(PointerEvent::Move { position: Point::new(110.0, 60.0) });
        c.handle_pointer(PointerEvent::Up { position: Point::new(110.0, 60.0), button: MouseButton::Left });
        let before = fetches(&service);
        pump(&mut board, &service, now);

        assert_eq!(
            service.applied(),
            vec![Action::MoveItem { name: "A1".into(), to: Point::new(100.0, 50.0) }]
        );
        assert_eq!(fetches(&service), before + 1);
        assert_eq!(board.controller().scene().authoritative("A1").unwrap().origin(), Point::new(100.0, 50.0));
    }

    #[test]
    fn test_failed_mutation_rolls_back_after_forced_refresh() {
        let service = service();
        let mut board = Board::new(BoardConfig::default(), Viewer::admin("alice"));
        let now = Instant::now();
        pump(&mut board, &service, now);

        service.fail_next(RemoteError::Status { code: 500, message: "boom".into() });
        board
            .controller_mut()
            .dispatch(Action::SetPriority { name: "B2".into(), priority: Priority::Urgent })
            .unwrap();
        pump(&mut board, &service, now);
        assert_eq!(board.controller().scene().get("B2").unwrap().priority, None);
        assert!(board.take_effects().iter().any(|e| matches!(e, Effect::Alert(_))));
    }

    #[test]
    fn test_unauthorized_image_expires_session_and_retries_after_resume() {
        let service = service();
        let mut snapshot = service.snapshot();
        snapshot.background = Some(Background {
            image_path: Some("floor.png".into()),
            ..Background::default()
        });
        service.set_snapshot(snapshot);
        let mut board = Board::new(BoardConfig::default(), Viewer::admin("alice"));
        let now = Instant::now();

        let fetch = board.poll(now).pop().unwrap();
        let image = board.deliver(block_on(execute(&service, fetch))).unwrap();
        service.fail_next(RemoteError::Unauthorized);
        assert_eq!(board.deliver(block_on(execute(&service, image))), None);

        assert!(board.controller().is_session_expired());
        assert!(board.images().get("floor.png").is_none());
        assert!(board.take_effects().contains(&Effect::SessionExpired));
        assert!(board.poll(now).is_empty());

        service.insert_image("floor.png", Raster::new(1, 1, vec![0; 4]).unwrap());
        board.resume_session();
        pump(&mut board, &service, now);
        assert!(matches!(board.images().get("floor.png"), Some(ImageEntry::Loaded(_))));
        assert_eq!(board.controller().status(), &SyncStatus::Live);
        assert_eq!(board.controller().scene().len(), 2);
    }

    #[test]
    fn test_refresh_failure_keeps_previous_scene() {
        let service = service();
        let mut board = Board::new(BoardConfig::default(), Viewer::member("guest"));
        let t0 = Instant::now();
        pump(&mut board, &service, t0);

        service.fail_all(RemoteError::Network("down".into()));
        pump(&mut board, &service, t0 + Duration::from_secs(10));
        assert_eq!(board.controller().status(), &SyncStatus::Error);
        assert_eq!(board.controller().scene().len(), 2);

        service.recover();
        pump(&mut board, &service, t0 + Duration::from_secs(20));
        assert_eq!(board.controller().status(), &SyncStatus::Live);
    }

    #[test]
    fn test_session_expiry_stops_polling_until_resumed() {
        let service = service();
        let mut board = Board::new(BoardConfig::default(), Viewer::member("guest"));
        let t0 = Instant::now();
        service.fail_next(RemoteError::Unauthorized);
        pump(&mut board, &service, t0);
        assert!(board.controller().is_session_expired());

        let calls = service.calls().len();
        pump(&mut board, &service, t0 + Duration::from_secs(60));
        assert_eq!(service.calls().len(), calls);

        board.resume_session();
        pump(&mut board, &service, t0 + Duration::from_secs(61));
        assert_eq!(board.controller().status(), &SyncStatus::Live);
        assert_eq!(board.controller().scene().len(), 2);
    }

    #[test]
    fn test_background_load_defers_first_draw() {
        let service = service();
        let mut snapshot = service.snapshot();
        snapshot.background = Some(Background {
            image_path: Some("floor.png".into()),
            ..Background::default()
        });
        service.set_snapshot(snapshot);
        service.insert_image("floor.png", Raster::new(2, 1, vec![0; 8]).unwrap());

        let mut board = Board::new(BoardConfig::default(), Viewer::member("guest"));
        let now = Instant::now();
        let requests = board.poll(now);
        let response = block_on(execute(&service, requests[0].clone()));
        let follow_up = board.deliver(response).unwrap();
        assert!(board.controller().scene().is_empty());

        board.deliver(block_on(execute(&service, follow_up)));
        assert_eq!(board.controller().scene().len(), 2);
        assert!(matches!(board.images().get("floor.png"), Some(ImageEntry::Loaded(_))));
    }

    #[test]
    fn test_missing_background_renders_without_it() {
        let service = service();
        let mut snapshot = service.snapshot();
        snapshot.background = Some(Background {
            image_path: Some("missing.png".into()),
            ..Background::default()
        });
        service.set_snapshot(snapshot);

        let mut board = Board::new(BoardConfig::default(), Viewer::member("guest"));
        let t0 = Instant::now();
        pump(&mut board, &service, t0);
        assert_eq!(board.controller().scene().len(), 2);
        assert_eq!(board.images().get("missing.png"), Some(&ImageEntry::Failed));

        pump(&mut board, &service, t0 + Duration::from_secs(10));
        let image_calls = service
            .calls()
            .iter()
            .filter(|c| matches!(c, RemoteRequest::FetchImage { .. }))
            .count();
        assert_eq!(image_calls, 1);
    }
}
