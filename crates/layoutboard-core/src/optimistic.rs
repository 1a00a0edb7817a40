//! Per-item optimistic overrides layered over the authoritative snapshot.

use crate::scene::{Item, PauseReason, Priority, Task, TaskState, TaskStatus};
use kurbo::Point;

/// Completion stamp shown for a task completed locally but not yet confirmed.
pub const LOCAL_COMPLETION_STAMP: &str = "local";

/// A set of field changes applied on top of an item.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ItemPatch {
    pub position: Option<Point>,
    pub details: Option<String>,
    pub priority: Option<Priority>,
    /// `Some(None)` clears the pause reason.
    pub pause: Option<Option<PauseReason>>,
    pub electrification: Option<TaskState>,
    pub control: Option<TaskState>,
}

impl ItemPatch {
    pub fn position(position: Point) -> Self {
        Self { position: Some(position), ..Self::default() }
    }

    pub fn details(details: impl Into<String>) -> Self {
        Self { details: Some(details.into()), ..Self::default() }
    }

    pub fn priority(priority: Priority) -> Self {
        Self { priority: Some(priority), ..Self::default() }
    }

    pub fn pause(reason: Option<PauseReason>) -> Self {
        Self { pause: Some(reason), ..Self::default() }
    }

    pub fn task(task: Task, state: TaskState) -> Self {
        match task {
            Task::Electrification => Self { electrification: Some(state), ..Self::default() },
            Task::Control => Self { control: Some(state), ..Self::default() },
        }
    }

    /// Fold a newer patch into this one; fields set in `newer` win.
    pub fn merge(&mut self, newer: ItemPatch) {
        if newer.position.is_some() {
            self.position = newer.position;
        }
        if newer.details.is_some() {
            self.details = newer.details;
        }
        if newer.priority.is_some() {
            self.priority = newer.priority;
        }
        if newer.pause.is_some() {
            self.pause = newer.pause;
        }
        if newer.electrification.is_some() {
            self.electrification = newer.electrification;
        }
        if newer.control.is_some() {
            self.control = newer.control;
        }
    }

    pub fn apply_to(&self, item: &mut Item) {
        if let Some(p) = self.position {
            item.x = p.x;
            item.y = p.y;
        }
        if let Some(details) = &self.details {
            item.details = Some(details.clone());
        }
        if let Some(priority) = self.priority {
            item.priority = Some(priority);
        }
        if let Some(pause) = self.pause {
            item.pause_status = pause;
        }
        if let Some(state) = self.electrification {
            let (status, stamp) = task_fields(state);
            item.electrification_status = Some(status);
            item.electrification_completed_at = stamp;
        }
        if let Some(state) = self.control {
            let (status, stamp) = task_fields(state);
            item.control_status = Some(status);
            item.control_completed_at = stamp;
        }
    }
}

fn task_fields(state: TaskState) -> (TaskStatus, Option<String>) {
    match state {
        TaskState::Pending => (TaskStatus::Pending, None),
        TaskState::ReadyUnconfirmed => (TaskStatus::Ready, None),
        TaskState::Done => (TaskStatus::Ready, Some(LOCAL_COMPLETION_STAMP.to_string())),
    }
}

/// Where an item's displayed state comes from.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum OverrideState {
    /// Shown as delivered by the last refresh.
    #[default]
    Authoritative,
    /// Local change shown while a gesture or request is in progress.
    PendingLocal(ItemPatch),
    /// A local change failed; the authoritative copy is shown again.
    Reverted,
}

/// Override slot for one item.
#[derive(Debug, Clone, Default)]
pub struct ItemOverride {
    state: OverrideState,
}

impl ItemOverride {
    pub fn state(&self) -> &OverrideState {
        &self.state
    }

    /// Stage a patch, merging with any patch already pending.
    pub fn stage(&mut self, patch: ItemPatch) {
        self.state = match std::mem::take(&mut self.state) {
            OverrideState::PendingLocal(mut pending) => {
                pending.merge(patch);
                OverrideState::PendingLocal(pending)
            }
            OverrideState::Authoritative | OverrideState::Reverted => OverrideState::PendingLocal(patch),
        };
    }

    pub fn revert(&mut self) {
        self.state = OverrideState::Reverted;
    }
}
