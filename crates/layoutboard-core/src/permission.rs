//! Caller identity and the modify-permission rule.

use crate::scene::Item;
use serde::{Deserialize, Serialize};

/// The user operating the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewer {
    pub name: String,
    /// Elevated (admin) privilege.
    pub elevated: bool,
}

impl Viewer {
    pub fn new(name: impl Into<String>, elevated: bool) -> Self {
        Self { name: name.into(), elevated }
    }

    pub fn admin(name: impl Into<String>) -> Self {
        Self::new(name, true)
    }

    pub fn member(name: impl Into<String>) -> Self {
        Self::new(name, false)
    }

    /// A caller may modify an item iff it is elevated and the item is
    /// unowned or owned by the caller.
    pub fn can_modify(&self, item: &Item) -> bool {
        self.elevated && item.owner.as_deref().is_none_or(|owner| owner == self.name)
    }

    /// Whether the item should render dimmed for this viewer.
    pub fn sees_foreign(&self, item: &Item) -> bool {
        self.elevated && item.owner.as_deref().is_some_and(|owner| owner != self.name)
    }
}
