//! Backend-neutral display list for one frame.
//!
//! A [`Frame`] is a pure function of the scene, the view transform and the
//! interaction flags. Commands are in world coordinates and are drawn under
//! [`Frame::transform`]; chrome metrics are pre-divided by the view scale.

use crate::style;
use kurbo::{Affine, BezPath, Circle, Point, Rect, RoundedRect, Shape as _, Size};
use layoutboard_core::overlay::{OverlayDescriptor, overlay_regions};
use layoutboard_core::refresh::ImageCache;
use layoutboard_core::remote::Raster;
use layoutboard_core::{InteractionFlags, Item, Mode, PauseReason, SceneModel, TaskState, ViewTransform};
use peniko::Color;
use std::sync::Arc;

/// Horizontal anchor of a text run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Start,
    Center,
    End,
}

/// Vertical anchor of a text run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextBaseline {
    Top,
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextWeight {
    Regular,
    SemiBold,
    Bold,
}

/// A line of text in world coordinates.
#[derive(Debug, Clone)]
pub struct TextRun {
    pub text: String,
    pub origin: Point,
    pub size: f64,
    pub color: Color,
    pub weight: TextWeight,
    pub align: TextAlign,
    pub baseline: TextBaseline,
    /// Wider text is squeezed horizontally to fit.
    pub max_width: Option<f64>,
}

/// Geometry of a fill or stroke command.
#[derive(Debug, Clone)]
pub enum DrawShape {
    Rect(Rect),
    RoundedRect(RoundedRect),
    Circle(Circle),
    Path(BezPath),
}

impl DrawShape {
    pub fn bounding_box(&self) -> Rect {
        match self {
            DrawShape::Rect(r) => *r,
            DrawShape::RoundedRect(r) => r.rect(),
            DrawShape::Circle(c) => c.bounding_box(),
            DrawShape::Path(p) => p.bounding_box(),
        }
    }
}

/// One drawing command.
#[derive(Debug, Clone)]
pub enum DrawCommand {
    /// Background raster stretched over `rect`. `key` identifies the raster
    /// for backend caches.
    Image {
        key: String,
        raster: Arc<Raster>,
        rect: Rect,
    },
    Fill {
        shape: DrawShape,
        color: Color,
    },
    Stroke {
        shape: DrawShape,
        color: Color,
        width: f64,
    },
    Text(TextRun),
}

/// Status icon shown below an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusIcon {
    /// Electrification marked ready, not yet confirmed.
    ElectrificationReady,
    /// Control marked ready, not yet confirmed.
    ControlReady,
    ReadyToShip,
    MissingParts,
    ConstructionError,
    Paused,
}

impl StatusIcon {
    /// Icons for an item: the pause icon alone, else a ready-to-ship icon,
    /// else zero to two checklist icons.
    pub fn for_item(item: &Item) -> Vec<StatusIcon> {
        if let Some(reason) = item.pause_status {
            return vec![match reason {
                PauseReason::MissingParts => StatusIcon::MissingParts,
                PauseReason::ConstructionError => StatusIcon::ConstructionError,
                PauseReason::Paused => StatusIcon::Paused,
            }];
        }
        if item.is_packaging_ready() {
            return vec![StatusIcon::ReadyToShip];
        }
        let mut icons = Vec::new();
        if item.electrification() == TaskState::ReadyUnconfirmed {
            icons.push(StatusIcon::ElectrificationReady);
        }
        if item.control() == TaskState::ReadyUnconfirmed {
            icons.push(StatusIcon::ControlReady);
        }
        icons
    }

    pub fn color(self) -> Color {
        match self {
            StatusIcon::ElectrificationReady => style::ICON_BOLT,
            StatusIcon::ControlReady => style::ICON_CHECK,
            StatusIcon::ReadyToShip => style::ICON_BOX,
            StatusIcon::MissingParts => style::ICON_MISSING_PARTS,
            StatusIcon::ConstructionError | StatusIcon::Paused => style::ICON_ALERT,
        }
    }
}

/// Percentage badge drawn above an item.
#[derive(Debug, Clone)]
pub struct Badge {
    pub text: String,
    pub color: Color,
}

/// Visual state of one item, derived from its data.
#[derive(Debug, Clone)]
pub struct ItemVisual {
    pub name: String,
    /// Bounds in world coordinates.
    pub rect: Rect,
    pub fill: Color,
    pub border: Color,
    /// Border width in world units.
    pub border_width: f64,
    /// Progress percentage in `[0, 100]`.
    pub progress: f64,
    pub priority_dot: Option<Color>,
    pub badge: Option<Badge>,
    pub icons: Vec<StatusIcon>,
}

impl ItemVisual {
    pub fn derive(item: &Item, flags: &InteractionFlags<'_>, scale: f64) -> Self {
        let (mut border, mut border_width) = match item.pause_status {
            Some(PauseReason::MissingParts) => (style::BORDER_MISSING_PARTS, style::PAUSED_LINE_WIDTH),
            Some(_) => (style::BORDER_PAUSED, style::PAUSED_LINE_WIDTH),
            None => (style::ITEM_BORDER, style::LINE_WIDTH),
        };
        if flags.highlighted == Some(item.name.as_str()) {
            border = style::BORDER_HIGHLIGHT;
            border_width = style::HIGHLIGHT_LINE_WIDTH;
        }
        let fill = if flags.viewer.sees_foreign(item) {
            style::ITEM_FILL_FOREIGN
        } else {
            style::ITEM_FILL
        };
        let badge = item.status.map(|status| {
            let pct = status.percentage();
            Badge {
                text: format!("{pct}%"),
                color: if status.is_complete() { style::BADGE_COMPLETE } else { style::BADGE_TEXT },
            }
        });
        Self {
            name: item.name.clone(),
            rect: item.bounds(),
            fill,
            border,
            border_width: border_width / scale,
            progress: item.status.map(|s| s.percentage()).unwrap_or(0.0),
            priority_dot: item.priority.and_then(style::priority_color),
            badge,
            icons: StatusIcon::for_item(item),
        }
    }
}

/// A built frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// World-to-screen transform for every command.
    pub transform: Affine,
    pub viewport: Size,
    pub scale: f64,
    pub commands: Vec<DrawCommand>,
    /// Removal-mode hit targets, empty outside removal mode.
    pub overlays: Vec<OverlayDescriptor>,
    pub items: Vec<ItemVisual>,
    pub has_background: bool,
}

/// Builds a [`Frame`] from engine state.
pub struct FrameBuilder<'a> {
    scene: &'a SceneModel,
    view: &'a ViewTransform,
    flags: InteractionFlags<'a>,
    images: Option<&'a ImageCache>,
    viewport: Size,
}

impl<'a> FrameBuilder<'a> {
    pub fn new(scene: &'a SceneModel, view: &'a ViewTransform, flags: InteractionFlags<'a>) -> Self {
        Self {
            scene,
            view,
            flags,
            images: None,
            viewport: Size::ZERO,
        }
    }

    /// Use loaded background rasters from this cache.
    pub fn with_images(mut self, images: &'a ImageCache) -> Self {
        self.images = Some(images);
        self
    }

    pub fn with_viewport(mut self, viewport: Size) -> Self {
        self.viewport = viewport;
        self
    }

    pub fn build(self) -> Frame {
        let scale = self.view.scale();
        let mut commands = Vec::new();

        let background = self.scene.background().and_then(|bg| {
            let path = bg.image_path.as_deref().filter(|p| !p.is_empty())?;
            let raster = self.images?.loaded(path)?;
            Some((path.to_string(), bg.placement(raster.size()), raster))
        });
        let has_background = background.is_some();
        if let Some((key, rect, raster)) = background {
            commands.push(DrawCommand::Image { key, raster, rect });
        }

        let mut items = Vec::new();
        for item in self.scene.projects() {
            let visual = ItemVisual::derive(&item, &self.flags, scale);
            push_item(&mut commands, &item, &visual, scale);
            items.push(visual);
        }

        let overlays = if self.flags.mode == Mode::Remove {
            overlay_regions(self.scene, self.view, self.flags.viewer)
        } else {
            Vec::new()
        };

        Frame {
            transform: self.view.transform(),
            viewport: self.viewport,
            scale,
            commands,
            overlays,
            items,
            has_background,
        }
    }
}

fn push_item(commands: &mut Vec<DrawCommand>, item: &Item, visual: &ItemVisual, scale: f64) {
    let m = |v: f64| v / scale;
    let rect = visual.rect;
    let (x, y, w, h) = (rect.x0, rect.y0, rect.width(), rect.height());
    let pad = m(style::PADDING);
    let font = m(style::FONT_SIZE);

    let body = RoundedRect::from_rect(rect, m(style::CORNER_RADIUS));
    commands.push(DrawCommand::Fill {
        shape: DrawShape::RoundedRect(body),
        color: visual.fill,
    });
    commands.push(DrawCommand::Stroke {
        shape: DrawShape::RoundedRect(body),
        color: visual.border,
        width: visual.border_width,
    });

    let bar_top = y + h - m(style::PROGRESS_HEIGHT);
    commands.push(DrawCommand::Fill {
        shape: DrawShape::Rect(Rect::new(x, bar_top, x + w, y + h)),
        color: style::PROGRESS_TRACK,
    });
    if visual.progress > 0.0 {
        commands.push(DrawCommand::Fill {
            shape: DrawShape::Rect(Rect::new(x, bar_top, x + w * visual.progress / 100.0, y + h)),
            color: style::PROGRESS_FILL,
        });
    }

    let mut text_x = x + pad;
    if let Some(color) = visual.priority_dot {
        let radius = m(style::PRIORITY_DOT_RADIUS);
        commands.push(DrawCommand::Fill {
            shape: DrawShape::Circle(Circle::new((x + pad, y + pad + font / 2.0), radius)),
            color,
        });
        text_x += radius * 2.0 + pad / 2.0;
    }

    let reserved = if item.owner.is_some() { 45.0 } else { 40.0 };
    commands.push(DrawCommand::Text(TextRun {
        text: item.name.clone(),
        origin: Point::new(text_x, y + pad),
        size: font,
        color: style::TEXT_PRIMARY,
        weight: TextWeight::SemiBold,
        align: TextAlign::Start,
        baseline: TextBaseline::Top,
        max_width: Some((w - (text_x - x) - pad - reserved).max(0.0)),
    }));

    if let Some(owner) = &item.owner {
        commands.push(DrawCommand::Text(TextRun {
            text: owner.clone(),
            origin: Point::new(x + w - pad, y + pad + font * 1.2),
            size: m(style::OWNER_FONT_SIZE),
            color: style::TEXT_MUTED,
            weight: TextWeight::Regular,
            align: TextAlign::End,
            baseline: TextBaseline::Top,
            max_width: None,
        }));
    }

    if let Some(badge) = &visual.badge {
        commands.push(DrawCommand::Text(TextRun {
            text: badge.text.clone(),
            origin: Point::new(x + w / 2.0, y - pad * 0.5),
            size: font * style::BADGE_FONT_SCALE,
            color: badge.color,
            weight: TextWeight::Bold,
            align: TextAlign::Center,
            baseline: TextBaseline::Bottom,
            max_width: None,
        }));
    }

    commands.push(DrawCommand::Text(TextRun {
        text: format!("Worker: {}", item.worker_label()),
        origin: Point::new(x + pad, y + pad + font * 1.4),
        size: m(style::SUB_FONT_SIZE),
        color: style::TEXT_MUTED,
        weight: TextWeight::Regular,
        align: TextAlign::Start,
        baseline: TextBaseline::Top,
        max_width: Some((w - pad * 2.0).max(0.0)),
    }));

    if !visual.icons.is_empty() {
        let size = m(style::ICON_SIZE);
        let spacing = m(style::ICON_SPACING);
        let n = visual.icons.len() as f64;
        let total = n * size + (n - 1.0) * spacing;
        let mut icon_x = x + w / 2.0 - total / 2.0;
        let icon_y = y + h + pad;
        for icon in &visual.icons {
            push_icon(commands, *icon, Point::new(icon_x, icon_y), size, scale);
            icon_x += size + spacing;
        }
    }
}

fn polyline(points: &[(f64, f64)]) -> BezPath {
    let mut path = BezPath::new();
    for (i, p) in points.iter().enumerate() {
        if i == 0 {
            path.move_to(*p);
        } else {
            path.line_to(*p);
        }
    }
    path
}

fn push_icon(commands: &mut Vec<DrawCommand>, icon: StatusIcon, at: Point, s: f64, scale: f64) {
    let color = icon.color();
    let p = |fx: f64, fy: f64| (at.x + s * fx, at.y + s * fy);
    let thin = style::ICON_LINE_WIDTH / scale;
    match icon {
        StatusIcon::ElectrificationReady => {
            let mut bolt = polyline(&[
                p(0.4, 0.0),
                p(0.0, 0.6),
                p(0.3, 0.6),
                p(0.2, 1.0),
                p(1.0, 0.4),
                p(0.7, 0.4),
                p(0.8, 0.0),
            ]);
            bolt.close_path();
            commands.push(DrawCommand::Fill { shape: DrawShape::Path(bolt), color });
        }
        StatusIcon::ControlReady => {
            commands.push(DrawCommand::Stroke {
                shape: DrawShape::Path(polyline(&[p(0.1, 0.5), p(0.4, 0.9), p(0.9, 0.1)])),
                color,
                width: style::CHECK_LINE_WIDTH / scale,
            });
        }
        StatusIcon::ReadyToShip => {
            let mut path = Rect::from_origin_size(at, (s, s)).to_path(0.1);
            path.move_to(p(0.0, 0.3));
            path.line_to(p(1.0, 0.3));
            commands.push(DrawCommand::Stroke { shape: DrawShape::Path(path), color, width: thin });
        }
        StatusIcon::MissingParts => {
            let mut path = Circle::new(p(0.4, 0.4), s * 0.35).to_path(0.1);
            path.move_to(p(0.65, 0.65));
            path.line_to(p(0.9, 0.9));
            commands.push(DrawCommand::Stroke { shape: DrawShape::Path(path), color, width: thin });
        }
        StatusIcon::ConstructionError => {
            let mut path = Circle::new(p(0.25, 0.25), s * 0.2).to_path(0.1);
            path.move_to(p(0.4, 0.4));
            path.line_to(p(0.8, 0.8));
            path.move_to(p(0.6, 0.9));
            path.line_to(p(0.9, 0.6));
            commands.push(DrawCommand::Stroke { shape: DrawShape::Path(path), color, width: thin });
        }
        StatusIcon::Paused => {
            for fx in [0.2, 0.6] {
                let bar = Rect::from_origin_size(p(fx, 0.0), (s * 0.2, s));
                commands.push(DrawCommand::Fill { shape: DrawShape::Rect(bar), color });
            }
        }
    }
}
