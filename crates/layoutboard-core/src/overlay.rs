//! Screen-space overlay regions that track rendered items.
//!
//! In removal mode every item the viewer may modify gets a transparent
//! hit target laid over it by the presentation layer. The regions are
//! recomputed from the same view transform used for drawing, and the whole
//! list is replaced on each redraw.

use crate::permission::Viewer;
use crate::scene::SceneModel;
use crate::view::ViewTransform;
use kurbo::{Point, Rect, Size};

/// One positioned hit target.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayDescriptor {
    /// Item name carried back on click.
    pub name: String,
    /// Top-left corner in screen pixels.
    pub origin: Point,
    /// Unscaled item size in world units.
    pub size: Size,
    /// Scale applied to `size` around `origin`.
    pub scale: f64,
}

impl OverlayDescriptor {
    /// Screen rectangle covered by the region.
    pub fn screen_rect(&self) -> Rect {
        Rect::from_origin_size(
            self.origin,
            Size::new(self.size.width * self.scale, self.size.height * self.scale),
        )
    }
}

/// Compute one region per project item the viewer may modify.
pub fn overlay_regions(scene: &SceneModel, view: &ViewTransform, viewer: &Viewer) -> Vec<OverlayDescriptor> {
    scene
        .projects()
        .filter(|item| viewer.can_modify(item))
        .map(|item| OverlayDescriptor {
            name: item.name.clone(),
            origin: view.to_screen(item.origin()),
            size: item.size(),
            scale: view.scale(),
        })
        .collect()
}

/// Current overlay regions, replaced wholesale on every redraw.
#[derive(Debug, Clone, Default)]
pub struct OverlaySync {
    regions: Vec<OverlayDescriptor>,
}

impl OverlaySync {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute regions. Outside removal mode the list is emptied.
    pub fn sync(&mut self, scene: &SceneModel, view: &ViewTransform, viewer: &Viewer, removal_mode: bool) {
        self.regions = if removal_mode {
            overlay_regions(scene, view, viewer)
        } else {
            Vec::new()
        };
    }

    pub fn regions(&self) -> &[OverlayDescriptor] {
        &self.regions
    }

    /// Name of the topmost region under a screen point.
    pub fn region_at(&self, screen: Point) -> Option<&str> {
        self.regions
            .iter()
            .rev()
            .find(|r| r.screen_rect().contains(screen))
            .map(|r| r.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Item, LayoutSnapshot};
    use kurbo::Vec2;

    fn scene() -> SceneModel {
        SceneModel::from_snapshot(LayoutSnapshot {
            background: None,
            items: vec![
                Item::project("free", 10.0, 20.0),
                Item::project("mine", 300.0, 0.0).with_owner("alice"),
                Item::project("theirs", 600.0, 0.0).with_owner("bob"),
            ],
        })
    }

    #[test]
    fn test_regions_only_for_modifiable_items() {
        let names: Vec<_> = overlay_regions(&scene(), &ViewTransform::new(), &Viewer::admin("alice"))
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["free", "mine"]);
        assert!(overlay_regions(&scene(), &ViewTransform::new(), &Viewer::member("alice")).is_empty());
    }

    #[test]
    fn test_regions_track_transform() {
        let mut view = ViewTransform::new();
        view.reset(2.0, Vec2::new(5.0, 7.0));
        let regions = overlay_regions(&scene(), &view, &Viewer::admin("alice"));
        let free = &regions[0];
        assert_eq!(free.origin, Point::new(25.0, 47.0));
        assert_eq!(free.screen_rect(), Rect::new(25.0, 47.0, 385.0, 167.0));
        assert_eq!(free.screen_rect(), view.rect_to_screen(Item::project("free", 10.0, 20.0).bounds()));
    }

    #[test]
    fn test_sync_replaces_regions() {
        let mut overlays = OverlaySync::new();
        let viewer = Viewer::admin("alice");
        overlays.sync(&scene(), &ViewTransform::new(), &viewer, true);
        assert_eq!(overlays.regions().len(), 2);
        assert_eq!(overlays.region_at(Point::new(15.0, 25.0)), Some("free"));
        assert_eq!(overlays.region_at(Point::new(650.0, 25.0)), None);

        overlays.sync(&scene(), &ViewTransform::new(), &viewer, false);
        assert!(overlays.regions().is_empty());
    }
}
