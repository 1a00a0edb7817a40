//! Interaction state machine.
//!
//! The controller owns the view transform, the scene and all optimistic
//! state. It never performs I/O: remote work is queued as [`RemoteRequest`]s
//! and UI side effects as [`Effect`]s, both drained by the host.

use crate::action::Action;
use crate::config::BoardConfig;
use crate::hit::find_topmost;
use crate::input::{Gesture, MouseButton, PointerEvent, exceeds_threshold, wheel_factor};
use crate::optimistic::ItemPatch;
use crate::overlay::OverlaySync;
use crate::permission::Viewer;
use crate::refresh::SyncStatus;
use crate::remote::{RemoteError, RemoteReply, RemoteRequest, RemoteResponse};
use crate::scene::{Item, LayoutSnapshot, SceneModel};
use crate::view::ViewTransform;
use kurbo::{Point, Size};
use thiserror::Error;

// Use web_time for WASM compatibility
#[cfg(target_arch = "wasm32")]
use web_time::Instant;
#[cfg(not(target_arch = "wasm32"))]
use std::time::Instant;

/// Interaction mode. Exactly one is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    #[default]
    Default,
    Add,
    Remove,
    Move,
}

/// Errors returned by controller operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    #[error("Permission denied: cannot {action} {name}")]
    PermissionDenied { action: &'static str, name: String },
    #[error("Session expired")]
    SessionExpired,
    #[error("Unknown item: {0}")]
    UnknownItem(String),
    #[error("Nothing selected")]
    NoSelection,
    #[error("Not in {0:?} mode")]
    NotInMode(Mode),
}

/// Identifies one opening of the inspection panel.
///
/// A result arriving for a ticket that is no longer current belongs to a
/// panel that has since closed or switched item and must be dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectionTicket {
    pub name: String,
    generation: u64,
}

/// UI side effects for the host.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Redraw,
    Alert(String),
    /// Ask the user to confirm removing an item.
    ConfirmRemoval { name: String },
    /// Open the item selector for placing an item at a world position.
    OpenAddSelector { at: Point },
    /// Fill the open selector.
    ShowAddable(Vec<String>),
    OpenInspection { ticket: InspectionTicket, item: Item },
    /// Re-render the open panel from refreshed data.
    RefreshInspection { ticket: InspectionTicket, item: Item },
    CloseInspection,
    /// Hand control to the authentication collaborator.
    SessionExpired,
}

#[derive(Debug, Clone)]
struct Highlight {
    name: String,
    until: Instant,
}

/// Per-frame inputs the renderer needs besides scene and view.
#[derive(Debug, Clone, Copy)]
pub struct InteractionFlags<'a> {
    pub viewer: &'a Viewer,
    pub highlighted: Option<&'a str>,
    pub mode: Mode,
}

/// Interaction controller for the layout board.
#[derive(Debug)]
pub struct InteractionController {
    config: BoardConfig,
    viewer: Viewer,
    view: ViewTransform,
    viewport: Size,
    scene: SceneModel,
    mode: Mode,
    gesture: Gesture,
    highlight: Option<Highlight>,
    inspection: Option<InspectionTicket>,
    inspection_generation: u64,
    /// Re-render the open panel once the next snapshot lands.
    panel_refresh_pending: bool,
    add_anchor: Option<Point>,
    pending_removal: Option<String>,
    status: SyncStatus,
    session_expired: bool,
    overlays: OverlaySync,
    requests: Vec<RemoteRequest>,
    effects: Vec<Effect>,
}

impl InteractionController {
    pub fn new(config: BoardConfig, viewer: Viewer) -> Self {
        Self {
            view: config.view(),
            config,
            viewer,
            viewport: Size::ZERO,
            scene: SceneModel::new(),
            mode: Mode::Default,
            gesture: Gesture::Idle,
            highlight: None,
            inspection: None,
            inspection_generation: 0,
            panel_refresh_pending: false,
            add_anchor: None,
            pending_removal: None,
            status: SyncStatus::Syncing,
            session_expired: false,
            overlays: OverlaySync::new(),
            requests: Vec::new(),
            effects: Vec::new(),
        }
    }

    // --- Accessors ---

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    pub fn viewer(&self) -> &Viewer {
        &self.viewer
    }

    pub fn view(&self) -> &ViewTransform {
        &self.view
    }

    pub fn viewport(&self) -> Size {
        self.viewport
    }

    pub fn scene(&self) -> &SceneModel {
        &self.scene
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn gesture(&self) -> &Gesture {
        &self.gesture
    }

    pub fn status(&self) -> &SyncStatus {
        &self.status
    }

    pub fn is_session_expired(&self) -> bool {
        self.session_expired
    }

    pub fn highlighted(&self) -> Option<&str> {
        self.highlight.as_ref().map(|h| h.name.as_str())
    }

    pub fn inspection(&self) -> Option<&InspectionTicket> {
        self.inspection.as_ref()
    }

    /// Whether a result tagged with `ticket` may still be shown.
    pub fn accepts(&self, ticket: &InspectionTicket) -> bool {
        self.inspection.as_ref() == Some(ticket)
    }

    pub fn overlays(&self) -> &OverlaySync {
        &self.overlays
    }

    pub fn flags(&self) -> InteractionFlags<'_> {
        InteractionFlags {
            viewer: &self.viewer,
            highlighted: self.highlighted(),
            mode: self.mode,
        }
    }

    pub fn zoom_percent(&self) -> u32 {
        self.view.zoom_percent()
    }

    /// Drain queued remote requests.
    pub fn take_requests(&mut self) -> Vec<RemoteRequest> {
        std::mem::take(&mut self.requests)
    }

    /// Drain queued UI effects.
    pub fn take_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    fn redraw(&mut self) {
        self.overlays
            .sync(&self.scene, &self.view, &self.viewer, self.mode == Mode::Remove);
        if self.effects.last() != Some(&Effect::Redraw) {
            self.effects.push(Effect::Redraw);
        }
    }

    fn alert(&mut self, message: String) {
        self.effects.push(Effect::Alert(message));
    }

    // --- Pointer input ---

    /// Process a pointer event in screen coordinates.
    pub fn handle_pointer(&mut self, event: PointerEvent) {
        match event {
            PointerEvent::Down { position, button: MouseButton::Left } => self.pointer_down(position),
            PointerEvent::Up { position, button: MouseButton::Left } => self.pointer_up(position),
            PointerEvent::Down { .. } | PointerEvent::Up { .. } => {}
            PointerEvent::Move { position } => self.pointer_move(position),
            PointerEvent::Scroll { position, delta } => {
                if let Some(factor) = wheel_factor(delta, self.config.wheel_step) {
                    self.zoom_at(factor, position);
                }
            }
        }
    }

    fn pointer_down(&mut self, position: Point) {
        if self.mode == Mode::Move && !self.session_expired {
            let world = self.view.to_world(position);
            if let Some(item) = find_topmost(&self.scene, world) {
                if self.viewer.can_modify(&item) {
                    self.gesture = Gesture::Drag {
                        name: item.name.clone(),
                        offset: world - item.origin(),
                        press: position,
                        moved: false,
                    };
                    return;
                }
            }
        }
        self.gesture = Gesture::Pan {
            press: position,
            last: position,
            moved: false,
        };
    }

    fn pointer_move(&mut self, position: Point) {
        let threshold = self.config.click_threshold;
        match &mut self.gesture {
            Gesture::Idle => {}
            Gesture::Pan { press, last, moved } => {
                let delta = position - *last;
                *last = position;
                *moved |= exceeds_threshold(*press, position, threshold);
                self.view.pan(delta);
                self.redraw();
            }
            Gesture::Drag { name, offset, press, moved } => {
                *moved |= exceeds_threshold(*press, position, threshold);
                let origin = self.view.to_world(position) - *offset;
                let name = name.clone();
                self.scene.stage(&name, ItemPatch::position(origin));
                self.redraw();
            }
        }
    }

    fn pointer_up(&mut self, position: Point) {
        match std::mem::take(&mut self.gesture) {
            Gesture::Idle => {}
            Gesture::Drag { name, .. } => self.finish_drag(name),
            Gesture::Pan { press, moved, .. } => {
                if !moved && !exceeds_threshold(press, position, self.config.click_threshold) {
                    self.click(position);
                }
            }
        }
    }

    fn finish_drag(&mut self, name: String) {
        let local = self.scene.get(&name).map(|item| item.origin());
        let confirmed = self.scene.authoritative(&name).map(Item::origin);
        match (local, confirmed) {
            (Some(to), Some(from)) if to != from => {
                if let Err(e) = self.dispatch(Action::MoveItem { name: name.clone(), to }) {
                    log::info!("Drag of {name} not persisted: {e}");
                    self.scene.discard(&name);
                    self.redraw();
                }
            }
            _ => {
                self.scene.discard(&name);
            }
        }
    }

    fn click(&mut self, position: Point) {
        let world = self.view.to_world(position);
        match self.mode {
            Mode::Add => {
                self.add_anchor = Some(world);
                self.requests.push(RemoteRequest::ListAddable);
                self.effects.push(Effect::OpenAddSelector { at: world });
            }
            Mode::Remove | Mode::Move => {}
            Mode::Default => match find_topmost(&self.scene, world).map(|item| item.name.clone()) {
                Some(name) => self.open_inspection(&name),
                None => self.close_inspection(),
            },
        }
    }

    // --- View ---

    /// Zoom keeping the world point under `pivot` fixed.
    pub fn zoom_at(&mut self, factor: f64, pivot: Point) {
        self.view.zoom_at(factor, pivot);
        self.redraw();
    }

    /// Zoom in one button step around the viewport center.
    pub fn zoom_in(&mut self) {
        let center = self.viewport_center();
        self.zoom_at(self.config.button_step, center);
    }

    /// Zoom out one button step around the viewport center.
    pub fn zoom_out(&mut self) {
        let center = self.viewport_center();
        self.zoom_at(1.0 / self.config.button_step, center);
    }

    fn viewport_center(&self) -> Point {
        Point::new(self.viewport.width / 2.0, self.viewport.height / 2.0)
    }

    /// Record the drawing surface size.
    pub fn resize(&mut self, width: f64, height: f64) {
        self.viewport = Size::new(width.max(0.0), height.max(0.0));
        self.redraw();
    }

    // --- Modes ---

    /// Toggle a mode: selecting the active mode returns to Default.
    ///
    /// Any pending drag is cancelled without persisting, and leaving a
    /// non-Default mode closes the inspection panel.
    pub fn toggle_mode(&mut self, mode: Mode) -> Result<(), ControllerError> {
        let target = if self.mode == mode { Mode::Default } else { mode };
        if target != Mode::Default && !self.viewer.elevated {
            log::info!("{} may not enter {target:?} mode", self.viewer.name);
            self.alert("You do not have permission to edit the layout".to_string());
            return Err(ControllerError::PermissionDenied {
                action: "edit",
                name: "the layout".to_string(),
            });
        }
        self.set_mode(target);
        Ok(())
    }

    fn set_mode(&mut self, mode: Mode) {
        if let Some(name) = self.gesture.dragged() {
            let name = name.to_string();
            self.scene.discard(&name);
        }
        self.gesture = Gesture::Idle;
        self.add_anchor = None;
        self.pending_removal = None;
        let previous = std::mem::replace(&mut self.mode, mode);
        if previous != Mode::Default && previous != mode {
            self.close_inspection();
        }
        self.redraw();
    }

    /// An overlay region was clicked in removal mode.
    pub fn overlay_clicked(&mut self, name: &str) -> Result<(), ControllerError> {
        if self.mode != Mode::Remove {
            return Err(ControllerError::NotInMode(Mode::Remove));
        }
        if !self.scene.contains(name) {
            return Err(ControllerError::UnknownItem(name.to_string()));
        }
        self.pending_removal = Some(name.to_string());
        self.effects.push(Effect::ConfirmRemoval { name: name.to_string() });
        Ok(())
    }

    /// Answer to [`Effect::ConfirmRemoval`].
    pub fn confirm_removal(&mut self, name: &str, confirmed: bool) -> Result<(), ControllerError> {
        if self.pending_removal.as_deref() != Some(name) {
            return Err(ControllerError::NoSelection);
        }
        self.pending_removal = None;
        if !confirmed {
            self.set_mode(Mode::Default);
            return Ok(());
        }
        let result = self.dispatch(Action::RemoveItem { name: name.to_string() });
        if result.is_err() {
            self.set_mode(Mode::Default);
        }
        result
    }

    /// Place the chosen item at the anchor recorded by the add click.
    pub fn commit_add(&mut self, name: &str) -> Result<(), ControllerError> {
        let at = self.add_anchor.ok_or(ControllerError::NoSelection)?;
        self.set_mode(Mode::Default);
        self.dispatch(Action::AddItem { name: name.to_string(), at })
    }

    /// Dismiss the item selector.
    pub fn cancel_add(&mut self) {
        if self.mode == Mode::Add {
            self.set_mode(Mode::Default);
        }
        self.add_anchor = None;
    }

    // --- Actions ---

    /// Check permission, apply the optimistic change and queue the write.
    pub fn dispatch(&mut self, action: Action) -> Result<(), ControllerError> {
        if self.session_expired {
            return Err(ControllerError::SessionExpired);
        }
        if let Err(e) = self.authorize(&action) {
            log::info!("Rejected {} {}: {e}", action.kind(), action.target());
            self.alert(e.to_string());
            return Err(e);
        }
        if let Some(patch) = action.optimistic_patch() {
            let name = action.target().to_string();
            self.scene.stage(&name, patch);
            self.refresh_panel_now(&name);
            self.redraw();
        }
        log::debug!("Dispatching {} {}", action.kind(), action.target());
        self.requests.push(RemoteRequest::Apply(action));
        Ok(())
    }

    fn authorize(&self, action: &Action) -> Result<(), ControllerError> {
        let denied = || ControllerError::PermissionDenied {
            action: action.kind(),
            name: action.target().to_string(),
        };
        match action {
            Action::AddItem { .. } => {
                if self.viewer.elevated {
                    Ok(())
                } else {
                    Err(denied())
                }
            }
            Action::RemoveItem { name }
            | Action::MoveItem { name, .. }
            | Action::SetPriority { name, .. }
            | Action::SetPause { name, .. }
            | Action::SetDetails { name, .. }
            | Action::MarkTaskReady { name, .. }
            | Action::ResetTask { name, .. }
            | Action::CompleteTask { name, .. } => {
                let item = self
                    .scene
                    .authoritative(name)
                    .ok_or_else(|| ControllerError::UnknownItem(name.clone()))?;
                if self.viewer.can_modify(item) {
                    Ok(())
                } else {
                    Err(denied())
                }
            }
        }
    }

    /// Feed back a completed request the host executed.
    ///
    /// Layout and image fetches belong to the refresh loop; use
    /// [`apply_refresh`](Self::apply_refresh) for those.
    pub fn handle_response(&mut self, response: RemoteResponse) {
        match response.request {
            RemoteRequest::Apply(action) => self.action_settled(action, response.result),
            RemoteRequest::ListAddable => match response.result {
                Ok(RemoteReply::Addable(names)) => {
                    if self.add_anchor.is_some() {
                        self.effects.push(Effect::ShowAddable(names));
                    }
                }
                Ok(other) => log::warn!("Unexpected reply to addable list: {other:?}"),
                Err(e) => {
                    if e.is_session_expired() {
                        self.expire_session();
                    } else {
                        log::error!("Failed to list addable projects: {e}");
                        self.alert(format!("Failed to load projects: {e}"));
                    }
                    self.cancel_add();
                }
            },
            RemoteRequest::FetchLayout | RemoteRequest::FetchImage { .. } => {
                log::debug!("Ignoring refresh response routed to the controller");
            }
        }
    }

    fn action_settled(&mut self, action: Action, result: Result<RemoteReply, RemoteError>) {
        let name = action.target().to_string();
        match result {
            Ok(_) => {
                log::debug!("Persisted {} {name}", action.kind());
                if let Action::RemoveItem { .. } = action {
                    if self.mode == Mode::Remove {
                        self.set_mode(Mode::Default);
                    }
                    if self.inspection.as_ref().is_some_and(|t| t.name == name) {
                        self.close_inspection();
                    }
                } else if self.inspection.as_ref().is_some_and(|t| t.name == name) {
                    self.panel_refresh_pending = true;
                }
                self.requests.push(RemoteRequest::FetchLayout);
            }
            Err(e) => {
                self.scene.revert(&name);
                if e.is_session_expired() {
                    self.expire_session();
                    return;
                }
                log::error!("Failed to {} {name}: {e}", action.kind());
                self.alert(format!("Failed to {} {name}: {e}", action.kind()));
                self.refresh_panel_now(&name);
                self.redraw();
                self.requests.push(RemoteRequest::FetchLayout);
            }
        }
    }

    // --- Refresh ---

    /// A layout fetch was issued.
    pub fn refresh_started(&mut self) {
        if self.status == SyncStatus::Error || self.status == SyncStatus::Live {
            self.status = SyncStatus::Syncing;
        }
    }

    /// Replace the scene with a fresh snapshot.
    ///
    /// Local overrides are dropped, except the position of an item being
    /// dragged right now.
    pub fn apply_refresh(&mut self, snapshot: LayoutSnapshot) {
        let dragged = self
            .gesture
            .dragged()
            .and_then(|name| self.scene.get(name).map(|item| (name.to_string(), item.origin())));
        self.scene.replace(snapshot);
        if let Some((name, origin)) = dragged {
            if !self.scene.stage(&name, ItemPatch::position(origin)) {
                log::debug!("Dragged item {name} vanished in refresh");
                self.gesture = Gesture::Idle;
            }
        }
        if self.pending_removal.as_ref().is_some_and(|n| !self.scene.contains(n)) {
            self.pending_removal = None;
        }
        if !self.status.is_search() && self.status != SyncStatus::SessionExpired {
            self.status = SyncStatus::Live;
        }

        let pending = std::mem::take(&mut self.panel_refresh_pending);
        if let Some(ticket) = self.inspection.clone() {
            match self.scene.get(&ticket.name).map(|item| item.into_owned()) {
                Some(item) if pending => self.effects.push(Effect::RefreshInspection { ticket, item }),
                Some(_) => {}
                None => self.close_inspection(),
            }
        }
        self.redraw();
    }

    /// A layout fetch failed. The current scene is kept.
    pub fn refresh_failed(&mut self, error: &RemoteError) {
        if error.is_session_expired() {
            self.expire_session();
            return;
        }
        log::warn!("Layout refresh failed: {error}");
        self.status = SyncStatus::Error;
    }

    /// A background image settled without changing the scene.
    pub fn background_settled(&mut self) {
        self.redraw();
    }

    // --- Session ---

    fn expire_session(&mut self) {
        if self.session_expired {
            return;
        }
        log::warn!("Session expired for {}", self.viewer.name);
        self.session_expired = true;
        self.status = SyncStatus::SessionExpired;
        if let Some(name) = self.gesture.dragged() {
            let name = name.to_string();
            self.scene.discard(&name);
        }
        self.gesture = Gesture::Idle;
        self.effects.push(Effect::SessionExpired);
        self.redraw();
    }

    /// The authentication collaborator restored the session.
    pub fn resume_session(&mut self) {
        if !self.session_expired {
            return;
        }
        log::info!("Session resumed for {}", self.viewer.name);
        self.session_expired = false;
        self.status = SyncStatus::Syncing;
        self.requests.push(RemoteRequest::FetchLayout);
    }

    // --- Search and focus ---

    /// Center on the first project whose name contains `term`.
    pub fn search(&mut self, term: &str, now: Instant) {
        if term.trim().is_empty() {
            self.highlight = None;
            if self.status.is_search() {
                self.status = SyncStatus::Live;
            }
            self.redraw();
            return;
        }
        match self.scene.search(term) {
            Some(item) => {
                self.focus(&item, now);
                self.status = SyncStatus::Found(item.name);
            }
            None => {
                self.highlight = None;
                self.status = SyncStatus::NotFound;
                self.redraw();
            }
        }
    }

    /// Center on, highlight and inspect a named item.
    pub fn focus_item(&mut self, name: &str, now: Instant) -> Result<(), ControllerError> {
        let Some(item) = self.scene.get(name).map(|item| item.into_owned()) else {
            self.alert(format!("Project {name} is not on the layout"));
            return Err(ControllerError::UnknownItem(name.to_string()));
        };
        self.focus(&item, now);
        Ok(())
    }

    fn focus(&mut self, item: &Item, now: Instant) {
        self.view.center_on(item.bounds().center(), self.viewport, 1.0);
        self.highlight = Some(Highlight {
            name: item.name.clone(),
            until: now + self.config.highlight_duration,
        });
        self.open_inspection(&item.name);
        self.redraw();
    }

    /// Project items the viewer owns, sorted by name.
    pub fn my_items(&self) -> Vec<Item> {
        self.scene.owned_by(&self.viewer.name)
    }

    /// Expire the search highlight.
    pub fn tick(&mut self, now: Instant) {
        if self.highlight.as_ref().is_some_and(|h| now >= h.until) {
            self.highlight = None;
            self.redraw();
        }
    }

    // --- Inspection panel ---

    fn open_inspection(&mut self, name: &str) {
        let Some(item) = self.scene.get(name).map(|item| item.into_owned()) else {
            return;
        };
        self.inspection_generation += 1;
        let ticket = InspectionTicket {
            name: name.to_string(),
            generation: self.inspection_generation,
        };
        self.inspection = Some(ticket.clone());
        self.panel_refresh_pending = false;
        self.effects.push(Effect::OpenInspection { ticket, item });
    }

    /// Close the inspection panel, if open.
    pub fn close_inspection(&mut self) {
        if self.inspection.take().is_some() {
            self.panel_refresh_pending = false;
            self.effects.push(Effect::CloseInspection);
        }
    }

    fn refresh_panel_now(&mut self, name: &str) {
        let Some(ticket) = self.inspection.clone().filter(|t| t.name == name) else {
            return;
        };
        if let Some(item) = self.scene.get(name).map(|item| item.into_owned()) {
            self.effects.push(Effect::RefreshInspection { ticket, item });
        }
    }
}
