//! Hit-testing of world points against the scene.

use crate::scene::{Item, SceneModel};
use kurbo::Point;
use std::borrow::Cow;

/// Find the topmost project item containing a world point.
///
/// Items are scanned in reverse draw order so the one drawn last wins.
/// Non-project entities never match.
pub fn find_topmost(scene: &SceneModel, point: Point) -> Option<Cow<'_, Item>> {
    scene.projects().rev().find(|item| item.contains(point))
}

/// Names of every project item containing a world point, front to back.
pub fn items_at(scene: &SceneModel, point: Point) -> Vec<String> {
    scene
        .projects()
        .rev()
        .filter(|item| item.contains(point))
        .map(|item| item.name.clone())
        .collect()
}
