//! The closed set of mutating actions a viewer can request.

use crate::optimistic::ItemPatch;
use crate::scene::{PauseReason, Priority, Task, TaskState};
use kurbo::Point;
use serde::{Deserialize, Serialize};

/// A mutating action on the layout.
///
/// Every action goes through the controller's single dispatch path, which
/// checks permission before anything reaches the network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Action {
    /// Place an item from the addable list at a world position.
    AddItem { name: String, at: Point },
    RemoveItem { name: String },
    /// Persist a dragged position.
    MoveItem { name: String, to: Point },
    SetPriority { name: String, priority: Priority },
    SetPause { name: String, reason: Option<PauseReason> },
    SetDetails { name: String, details: String },
    /// Mark a checklist task ready (not yet confirmed).
    MarkTaskReady { name: String, task: Task },
    /// Undo a ready mark.
    ResetTask { name: String, task: Task },
    /// Confirm a ready task as done.
    CompleteTask { name: String, task: Task },
}

impl Action {
    /// Short verb used in logs and alerts.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::AddItem { .. } => "add",
            Action::RemoveItem { .. } => "remove",
            Action::MoveItem { .. } => "move",
            Action::SetPriority { .. } => "set priority of",
            Action::SetPause { .. } => "set pause reason of",
            Action::SetDetails { .. } => "update details of",
            Action::MarkTaskReady { .. } => "mark task ready on",
            Action::ResetTask { .. } => "reset task on",
            Action::CompleteTask { .. } => "complete task on",
        }
    }

    /// Name of the item the action targets.
    pub fn target(&self) -> &str {
        match self {
            Action::AddItem { name, .. }
            | Action::RemoveItem { name }
            | Action::MoveItem { name, .. }
            | Action::SetPriority { name, .. }
            | Action::SetPause { name, .. }
            | Action::SetDetails { name, .. }
            | Action::MarkTaskReady { name, .. }
            | Action::ResetTask { name, .. }
            | Action::CompleteTask { name, .. } => name,
        }
    }

    /// Local change shown while the action is in flight.
    pub fn optimistic_patch(&self) -> Option<ItemPatch> {
        match self {
            Action::AddItem { .. } | Action::RemoveItem { .. } => None,
            Action::MoveItem { to, .. } => Some(ItemPatch::position(*to)),
            Action::SetPriority { priority, .. } => Some(ItemPatch::priority(*priority)),
            Action::SetPause { reason, .. } => Some(ItemPatch::pause(*reason)),
            Action::SetDetails { details, .. } => Some(ItemPatch::details(details.clone())),
            Action::MarkTaskReady { task, .. } => Some(ItemPatch::task(*task, TaskState::ReadyUnconfirmed)),
            Action::ResetTask { task, .. } => Some(ItemPatch::task(*task, TaskState::Pending)),
            Action::CompleteTask { task, .. } => Some(ItemPatch::task(*task, TaskState::Done)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Item;

    #[test]
    fn test_target_and_kind() {
        let action = Action::SetPause { name: "A1".into(), reason: Some(PauseReason::MissingParts) };
        assert_eq!(action.target(), "A1");
        assert_eq!(action.kind(), "set pause reason of");
    }

    #[test]
    fn test_add_and_remove_have_no_local_patch() {
        assert!(Action::AddItem { name: "A".into(), at: Point::ZERO }.optimistic_patch().is_none());
        assert!(Action::RemoveItem { name: "A".into() }.optimistic_patch().is_none());
    }

    #[test]
    fn test_task_patches() {
        let mut item = Item::project("A1", 0.0, 0.0);
        Action::MarkTaskReady { name: "A1".into(), task: Task::Control }
            .optimistic_patch()
            .unwrap()
            .apply_to(&mut item);
        assert_eq!(item.control(), TaskState::ReadyUnconfirmed);
        Action::CompleteTask { name: "A1".into(), task: Task::Control }
            .optimistic_patch()
            .unwrap()
            .apply_to(&mut item);
        assert_eq!(item.control(), TaskState::Done);
    }
}
