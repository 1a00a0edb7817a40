//! Scene snapshot: placed items plus the background descriptor.

use crate::optimistic::{ItemOverride, ItemPatch, OverrideState};
use kurbo::{Point, Rect, Size};
use serde::{Deserialize, Deserializer, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;

/// Item width used when the snapshot carries none.
pub const DEFAULT_ITEM_WIDTH: f64 = 180.0;
/// Item height used when the snapshot carries none.
pub const DEFAULT_ITEM_HEIGHT: f64 = 60.0;

/// Kind of scene entity. Only projects are drawn and hit-tested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    #[default]
    Project,
    #[serde(other)]
    Other,
}

/// Item priority. Unknown values read as `Normal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Priority {
    Low,
    High,
    Urgent,
    #[default]
    #[serde(other)]
    Normal,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Normal => "Normal",
            Priority::High => "High",
            Priority::Urgent => "Urgent",
        }
    }
}

/// Reason an item is paused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PauseReason {
    #[serde(rename = "Missing Parts")]
    MissingParts,
    #[serde(rename = "Construction Error")]
    ConstructionError,
    #[serde(other)]
    Paused,
}

impl PauseReason {
    /// Parse a wire string. Empty strings and `"none"` mean not paused.
    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw.trim() {
            "" => None,
            s if s.eq_ignore_ascii_case("none") => None,
            "Missing Parts" => Some(PauseReason::MissingParts),
            "Construction Error" => Some(PauseReason::ConstructionError),
            _ => Some(PauseReason::Paused),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PauseReason::MissingParts => "Missing Parts",
            PauseReason::ConstructionError => "Construction Error",
            PauseReason::Paused => "Paused",
        }
    }
}

fn deserialize_pause<'de, D>(deserializer: D) -> Result<Option<PauseReason>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(PauseReason::from_wire))
}

/// Workflow status of a checklist task or of packaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TaskStatus {
    Ready,
    #[default]
    #[serde(other)]
    Pending,
}

/// Checklist tasks that can be marked ready and then confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Task {
    Electrification,
    Control,
}

impl Task {
    /// Path segment used by the remote contracts.
    pub fn as_str(self) -> &'static str {
        match self {
            Task::Electrification => "electrification",
            Task::Control => "control",
        }
    }
}

/// Display state of a task, derived from its status and completion stamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    Pending,
    /// Marked ready but not yet confirmed complete.
    ReadyUnconfirmed,
    Done,
}

impl TaskState {
    fn derive(status: Option<TaskStatus>, completed_at: Option<&str>) -> Self {
        if completed_at.is_some_and(|s| !s.is_empty()) {
            TaskState::Done
        } else if status == Some(TaskStatus::Ready) {
            TaskState::ReadyUnconfirmed
        } else {
            TaskState::Pending
        }
    }
}

/// Inventory progress of an item.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Progress {
    #[serde(default)]
    pub completed: u32,
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub percentage: f64,
}

impl Progress {
    /// Percentage clamped into `[0, 100]`.
    pub fn percentage(&self) -> f64 {
        if self.percentage.is_finite() {
            self.percentage.clamp(0.0, 100.0)
        } else {
            0.0
        }
    }

    pub fn is_complete(&self) -> bool {
        self.percentage() >= 100.0
    }
}

/// A placed project marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(rename = "type", default)]
    pub kind: ItemKind,
    pub name: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, deserialize_with = "deserialize_pause", skip_serializing_if = "Option::is_none")]
    pub pause_status: Option<PauseReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Progress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub electrification_status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub electrification_completed_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_completed_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packaging_status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl Item {
    /// Create an unowned project at a world position.
    pub fn project(name: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            kind: ItemKind::Project,
            name: name.into(),
            x,
            y,
            width: None,
            height: None,
            owner: None,
            priority: None,
            pause_status: None,
            status: None,
            electrification_status: None,
            electrification_completed_at: None,
            control_status: None,
            control_completed_at: None,
            packaging_status: None,
            details: None,
        }
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn with_size(mut self, width: f64, height: f64) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn is_project(&self) -> bool {
        self.kind == ItemKind::Project
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Size in world units, falling back to 180×60.
    pub fn size(&self) -> Size {
        Size::new(
            self.width.filter(|w| *w > 0.0).unwrap_or(DEFAULT_ITEM_WIDTH),
            self.height.filter(|h| *h > 0.0).unwrap_or(DEFAULT_ITEM_HEIGHT),
        )
    }

    /// Axis-aligned bounds in world coordinates.
    pub fn bounds(&self) -> Rect {
        Rect::from_origin_size(self.origin(), self.size())
    }

    /// Whether the bounds contain a world point, edges inclusive.
    pub fn contains(&self, point: Point) -> bool {
        let b = self.bounds();
        point.x >= b.x0 && point.x <= b.x1 && point.y >= b.y0 && point.y <= b.y1
    }

    /// Priority used for display.
    pub fn display_priority(&self) -> Priority {
        self.priority.unwrap_or_default()
    }

    pub fn electrification(&self) -> TaskState {
        TaskState::derive(self.electrification_status, self.electrification_completed_at.as_deref())
    }

    pub fn control(&self) -> TaskState {
        TaskState::derive(self.control_status, self.control_completed_at.as_deref())
    }

    pub fn task(&self, task: Task) -> TaskState {
        match task {
            Task::Electrification => self.electrification(),
            Task::Control => self.control(),
        }
    }

    pub fn is_packaging_ready(&self) -> bool {
        self.packaging_status == Some(TaskStatus::Ready)
    }

    /// Worker label shown on the item.
    pub fn worker_label(&self) -> &str {
        match self.details.as_deref() {
            Some(d) if !d.is_empty() => d,
            _ => "N/A",
        }
    }
}

/// Background raster placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Background {
    #[serde(default)]
    pub image_path: Option<String>,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    /// Width in world units; the raster's own width when absent.
    #[serde(default)]
    pub width: Option<f64>,
    /// Height in world units; the raster's own height when absent.
    #[serde(default)]
    pub height: Option<f64>,
}

impl Background {
    /// World rectangle the raster covers, given its natural pixel size.
    pub fn placement(&self, natural: Size) -> Rect {
        Rect::from_origin_size(
            Point::new(self.x, self.y),
            Size::new(
                self.width.unwrap_or(natural.width),
                self.height.unwrap_or(natural.height),
            ),
        )
    }
}

/// Wire payload of the layout snapshot call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LayoutSnapshot {
    #[serde(default)]
    pub background: Option<Background>,
    #[serde(default)]
    pub items: Vec<Item>,
}

impl LayoutSnapshot {
    /// Background image path, if the snapshot names one.
    pub fn background_path(&self) -> Option<&str> {
        self.background
            .as_ref()
            .and_then(|bg| bg.image_path.as_deref())
            .filter(|p| !p.is_empty())
    }
}

/// In-memory scene: the authoritative snapshot plus local overrides.
///
/// Items are kept in draw order (later entries draw on top). The
/// authoritative copy is only ever replaced wholesale; optimistic edits live
/// in `overrides` and are layered on read.
#[derive(Debug, Clone, Default)]
pub struct SceneModel {
    background: Option<Background>,
    items: Vec<Item>,
    overrides: HashMap<String, ItemOverride>,
}

impl SceneModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a scene from a snapshot with no local overrides.
    pub fn from_snapshot(snapshot: LayoutSnapshot) -> Self {
        let mut scene = Self::default();
        scene.replace(snapshot);
        scene
    }

    /// Replace the authoritative snapshot and drop every local override.
    pub fn replace(&mut self, snapshot: LayoutSnapshot) {
        self.background = snapshot.background;
        self.items = snapshot.items;
        self.overrides.clear();
    }

    pub fn background(&self) -> Option<&Background> {
        self.background.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Authoritative copy of an item, ignoring overrides.
    pub fn authoritative(&self, name: &str) -> Option<&Item> {
        self.items.iter().find(|i| i.name == name)
    }

    /// Item as currently displayed (overrides applied).
    pub fn get(&self, name: &str) -> Option<Cow<'_, Item>> {
        self.authoritative(name).map(|item| self.effective(item))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.authoritative(name).is_some()
    }

    /// Items in draw order with overrides applied.
    pub fn items(&self) -> impl DoubleEndedIterator<Item = Cow<'_, Item>> + '_ {
        self.items.iter().map(move |item| self.effective(item))
    }

    /// Project items in draw order with overrides applied.
    pub fn projects(&self) -> impl DoubleEndedIterator<Item = Cow<'_, Item>> + '_ {
        self.items.iter().filter(|i| i.is_project()).map(move |item| self.effective(item))
    }

    fn effective<'a>(&'a self, item: &'a Item) -> Cow<'a, Item> {
        match self.overrides.get(&item.name) {
            Some(ov) => match ov.state() {
                OverrideState::PendingLocal(patch) => {
                    let mut patched = item.clone();
                    patch.apply_to(&mut patched);
                    Cow::Owned(patched)
                }
                OverrideState::Authoritative | OverrideState::Reverted => Cow::Borrowed(item),
            },
            None => Cow::Borrowed(item),
        }
    }

    pub fn override_state(&self, name: &str) -> OverrideState {
        self.overrides
            .get(name)
            .map(|ov| ov.state().clone())
            .unwrap_or(OverrideState::Authoritative)
    }

    /// Layer a local patch over an item. Returns false if the item is unknown.
    pub fn stage(&mut self, name: &str, patch: ItemPatch) -> bool {
        if !self.contains(name) {
            return false;
        }
        self.overrides
            .entry(name.to_string())
            .or_default()
            .stage(patch);
        true
    }

    /// Mark an item's local patch as reverted so the authoritative copy shows.
    pub fn revert(&mut self, name: &str) {
        if let Some(ov) = self.overrides.get_mut(name) {
            ov.revert();
        }
    }

    /// Drop an item's override entirely.
    pub fn discard(&mut self, name: &str) {
        self.overrides.remove(name);
    }

    /// Project items owned by `owner`, sorted by name.
    pub fn owned_by(&self, owner: &str) -> Vec<Item> {
        let mut owned: Vec<Item> = self
            .projects()
            .filter(|i| i.owner.as_deref() == Some(owner))
            .map(Cow::into_owned)
            .collect();
        owned.sort_by(|a, b| a.name.cmp(&b.name));
        owned
    }

    /// First project whose name contains `term`, case-insensitively.
    pub fn search(&self, term: &str) -> Option<Item> {
        let needle = term.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }
        self.projects()
            .find(|i| i.name.to_lowercase().contains(&needle))
            .map(Cow::into_owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_defaults_to_180_by_60() {
        let item = Item::project("A1", 10.0, 20.0);
        assert_eq!(item.size(), Size::new(180.0, 60.0));
        assert_eq!(item.bounds(), Rect::new(10.0, 20.0, 190.0, 80.0));
    }

    #[test]
    fn test_parse_snapshot() {
        let json = r#"{
            "background": {"image_path": "floor.png", "x": 0, "y": 0, "width": 2000, "height": 1000},
            "items": [
                {"type": "project", "name": "A1", "x": 5, "y": 6, "owner": "alice",
                 "priority": "Urgent", "pause_status": "Missing Parts",
                 "status": {"completed": 3, "total": 4, "percentage": 75},
                 "electrification_status": "Ready", "control_status": "Ready",
                 "control_completed_at": "2024-03-01T10:00:00"},
                {"type": "label", "name": "Hall B", "x": 0, "y": 0},
                {"type": "project", "name": "B2", "x": 1, "y": 1, "pause_status": "none", "priority": "Whatever"}
            ]
        }"#;
        let snapshot: LayoutSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.background_path(), Some("floor.png"));
        assert_eq!(snapshot.items.len(), 3);

        let a1 = &snapshot.items[0];
        assert_eq!(a1.priority, Some(Priority::Urgent));
        assert_eq!(a1.pause_status, Some(PauseReason::MissingParts));
        assert_eq!(a1.electrification(), TaskState::ReadyUnconfirmed);
        assert_eq!(a1.control(), TaskState::Done);
        assert!((a1.status.unwrap().percentage() - 75.0).abs() < f64::EPSILON);

        assert_eq!(snapshot.items[1].kind, ItemKind::Other);
        assert_eq!(snapshot.items[2].pause_status, None);
        assert_eq!(snapshot.items[2].display_priority(), Priority::Normal);
    }

    #[test]
    fn test_priority_wire_names() {
        assert_eq!(serde_json::to_string(&Priority::Normal).unwrap(), "\"Normal\"");
        assert_eq!(serde_json::from_str::<Priority>("\"High\"").unwrap(), Priority::High);
        assert_eq!(serde_json::from_str::<Priority>("\"Critical\"").unwrap(), Priority::Normal);
        assert_eq!(Priority::default(), Priority::Normal);
    }

    #[test]
    fn test_pause_reason_wire_values() {
        assert_eq!(PauseReason::from_wire("Construction Error"), Some(PauseReason::ConstructionError));
        assert_eq!(PauseReason::from_wire("Paused"), Some(PauseReason::Paused));
        assert_eq!(PauseReason::from_wire(""), None);
        assert_eq!(PauseReason::from_wire("None"), None);
        let json = serde_json::to_string(&PauseReason::MissingParts).unwrap();
        assert_eq!(json, "\"Missing Parts\"");
    }

    #[test]
    fn test_progress_is_clamped() {
        let p = Progress { completed: 0, total: 0, percentage: 140.0 };
        assert!((p.percentage() - 100.0).abs() < f64::EPSILON);
        let p = Progress { completed: 0, total: 0, percentage: -3.0 };
        assert!(p.percentage().abs() < f64::EPSILON);
    }

    #[test]
    fn test_overrides_layer_on_read_and_clear_on_replace() {
        let mut scene = SceneModel::from_snapshot(LayoutSnapshot {
            background: None,
            items: vec![Item::project("A1", 0.0, 0.0)],
        });
        assert!(scene.stage("A1", ItemPatch::position(Point::new(50.0, 60.0))));
        assert_eq!(scene.get("A1").unwrap().origin(), Point::new(50.0, 60.0));
        assert_eq!(scene.authoritative("A1").unwrap().origin(), Point::ZERO);

        scene.revert("A1");
        assert_eq!(scene.get("A1").unwrap().origin(), Point::ZERO);
        assert_eq!(scene.override_state("A1"), OverrideState::Reverted);

        scene.stage("A1", ItemPatch::position(Point::new(1.0, 1.0)));
        scene.replace(LayoutSnapshot {
            background: None,
            items: vec![Item::project("A1", 7.0, 8.0)],
        });
        assert_eq!(scene.get("A1").unwrap().origin(), Point::new(7.0, 8.0));
        assert_eq!(scene.override_state("A1"), OverrideState::Authoritative);
    }

    #[test]
    fn test_stage_unknown_item() {
        let mut scene = SceneModel::new();
        assert!(!scene.stage("ghost", ItemPatch::details("x")));
    }

    #[test]
    fn test_owned_by_sorted() {
        let scene = SceneModel::from_snapshot(LayoutSnapshot {
            background: None,
            items: vec![
                Item::project("Zeta", 0.0, 0.0).with_owner("bob"),
                Item::project("Alpha", 0.0, 0.0).with_owner("bob"),
                Item::project("Mid", 0.0, 0.0).with_owner("alice"),
            ],
        });
        let names: Vec<_> = scene.owned_by("bob").into_iter().map(|i| i.name).collect();
        assert_eq!(names, vec!["Alpha", "Zeta"]);
    }

    #[test]
    fn test_search_case_insensitive() {
        let scene = SceneModel::from_snapshot(LayoutSnapshot {
            background: None,
            items: vec![Item::project("P-1001", 0.0, 0.0), Item::project("P-2002", 0.0, 0.0)],
        });
        assert_eq!(scene.search("  p-20 ").map(|i| i.name), Some("P-2002".to_string()));
        assert!(scene.search("nothing").is_none());
        assert!(scene.search("   ").is_none());
    }
}
