//! In-memory layout service.

use super::{BoxFuture, LayoutService, Raster, RemoteError, RemoteRequest, RemoteResult};
use crate::action::Action;
use crate::optimistic::ItemPatch;
use crate::scene::{Item, LayoutSnapshot};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

#[derive(Default)]
struct State {
    snapshot: LayoutSnapshot,
    images: HashMap<String, Raster>,
    addable: Vec<String>,
    /// Errors returned by the next calls, in order.
    queued_failures: VecDeque<RemoteError>,
    /// Error returned by every call while set.
    outage: Option<RemoteError>,
    calls: Vec<RemoteRequest>,
}

/// In-memory layout service for testing and offline use.
///
/// Applied actions mutate the stored snapshot the way the real service would,
/// so a follow-up fetch observes them.
#[derive(Default)]
pub struct MemoryLayoutService {
    state: RefCell<State>,
}

impl MemoryLayoutService {
    /// Create an empty service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a service serving the given snapshot.
    pub fn with_snapshot(snapshot: LayoutSnapshot) -> Self {
        let service = Self::new();
        service.state.borrow_mut().snapshot = snapshot;
        service
    }

    pub fn set_snapshot(&self, snapshot: LayoutSnapshot) {
        self.state.borrow_mut().snapshot = snapshot;
    }

    pub fn snapshot(&self) -> LayoutSnapshot {
        self.state.borrow().snapshot.clone()
    }

    pub fn insert_image(&self, path: impl Into<String>, raster: Raster) {
        self.state.borrow_mut().images.insert(path.into(), raster);
    }

    pub fn set_addable(&self, names: Vec<String>) {
        self.state.borrow_mut().addable = names;
    }

    /// Fail the next call with `error`. Calls queue up in order.
    pub fn fail_next(&self, error: RemoteError) {
        self.state.borrow_mut().queued_failures.push_back(error);
    }

    /// Fail every call with `error` until [`recover`](Self::recover).
    pub fn fail_all(&self, error: RemoteError) {
        self.state.borrow_mut().outage = Some(error);
    }

    pub fn recover(&self) {
        self.state.borrow_mut().outage = None;
    }

    /// Every request received so far.
    pub fn calls(&self) -> Vec<RemoteRequest> {
        self.state.borrow().calls.clone()
    }

    /// Applied actions received so far.
    pub fn applied(&self) -> Vec<Action> {
        self.state
            .borrow()
            .calls
            .iter()
            .filter_map(|call| match call {
                RemoteRequest::Apply(action) => Some(action.clone()),
                _ => None,
            })
            .collect()
    }

    fn begin(&self, call: RemoteRequest) -> RemoteResult<()> {
        let mut state = self.state.borrow_mut();
        state.calls.push(call);
        if let Some(error) = state.queued_failures.pop_front() {
            return Err(error);
        }
        match &state.outage {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn apply_now(&self, action: &Action) -> RemoteResult<()> {
        let mut state = self.state.borrow_mut();
        let state = &mut *state;
        match action {
            Action::AddItem { name, at } => {
                let Some(pos) = state.addable.iter().position(|n| n == name) else {
                    return Err(not_found(name));
                };
                state.addable.remove(pos);
                state.snapshot.items.push(Item::project(name.clone(), at.x, at.y));
                Ok(())
            }
            Action::RemoveItem { name } => {
                let before = state.snapshot.items.len();
                state.snapshot.items.retain(|item| &item.name != name);
                if state.snapshot.items.len() == before {
                    return Err(not_found(name));
                }
                state.addable.push(name.clone());
                Ok(())
            }
            _ => {
                let patch = action.optimistic_patch().unwrap_or_default();
                let item = state
                    .snapshot
                    .items
                    .iter_mut()
                    .find(|item| item.name == action.target())
                    .ok_or_else(|| not_found(action.target()))?;
                apply_confirmed(&patch, item);
                Ok(())
            }
        }
    }
}

/// Apply a patch the way the server records it: completion stamps become
/// real timestamps instead of the local marker.
fn apply_confirmed(patch: &ItemPatch, item: &mut Item) {
    patch.apply_to(item);
    for stamp in [&mut item.electrification_completed_at, &mut item.control_completed_at] {
        if stamp.as_deref() == Some(crate::optimistic::LOCAL_COMPLETION_STAMP) {
            *stamp = Some("1970-01-01T00:00:00".to_string());
        }
    }
}

fn not_found(name: &str) -> RemoteError {
    RemoteError::Status {
        code: 404,
        message: format!("Project {name} not found"),
    }
}

impl LayoutService for MemoryLayoutService {
    fn fetch_layout(&self) -> BoxFuture<'_, RemoteResult<LayoutSnapshot>> {
        Box::pin(async move {
            self.begin(RemoteRequest::FetchLayout)?;
            Ok(self.snapshot())
        })
    }

    fn fetch_image(&self, path: &str) -> BoxFuture<'_, RemoteResult<Raster>> {
        let path = path.to_string();
        Box::pin(async move {
            self.begin(RemoteRequest::FetchImage { path: path.clone() })?;
            self.state
                .borrow()
                .images
                .get(&path)
                .cloned()
                .ok_or_else(|| not_found(&path))
        })
    }

    fn list_addable(&self) -> BoxFuture<'_, RemoteResult<Vec<String>>> {
        Box::pin(async move {
            self.begin(RemoteRequest::ListAddable)?;
            Ok(self.state.borrow().addable.clone())
        })
    }

    fn apply(&self, action: &Action) -> BoxFuture<'_, RemoteResult<()>> {
        let action = action.clone();
        Box::pin(async move {
            self.begin(RemoteRequest::Apply(action.clone()))?;
            self.apply_now(&action)
        })
    }
}
