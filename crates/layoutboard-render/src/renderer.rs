//! Renderer trait abstraction.

use crate::frame::{DrawCommand, Frame};
use crate::style;
use kurbo::Size;
use peniko::Color;
use thiserror::Error;

/// Renderer errors.
#[derive(Debug, Error)]
pub enum RendererError {
    #[error("Image decode failed: {0}")]
    ImageDecode(String),
}

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RendererError>;

/// Context for a single render frame.
pub struct RenderContext<'a> {
    /// The display list to draw.
    pub frame: &'a Frame,
    /// Device pixel ratio (for HiDPI).
    pub scale_factor: f64,
    /// Background color.
    pub background_color: Color,
}

impl<'a> RenderContext<'a> {
    /// Create a new render context.
    pub fn new(frame: &'a Frame) -> Self {
        Self {
            frame,
            scale_factor: 1.0,
            background_color: style::BACKGROUND,
        }
    }

    /// Set the scale factor for HiDPI.
    pub fn with_scale_factor(mut self, scale_factor: f64) -> Self {
        self.scale_factor = scale_factor;
        self
    }

    /// Viewport size in physical pixels.
    pub fn physical_size(&self) -> Size {
        Size::new(
            self.frame.viewport.width * self.scale_factor,
            self.frame.viewport.height * self.scale_factor,
        )
    }
}

/// Trait for rendering backends.
///
/// Implementations can use Vello, a software rasterizer, or just inspect the
/// display list.
pub trait Renderer {
    /// Build the scene/command buffer for a frame.
    fn build_scene(&mut self, ctx: &RenderContext);

    /// Get the background color (for clearing).
    fn background_color(&self, ctx: &RenderContext) -> Color {
        ctx.background_color
    }
}

/// Tally of what one frame contained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub items: usize,
    pub overlays: usize,
    pub images: usize,
    pub fills: usize,
    pub strokes: usize,
    pub texts: usize,
}

impl FrameStats {
    pub fn of(frame: &Frame) -> Self {
        let mut stats = FrameStats {
            items: frame.items.len(),
            overlays: frame.overlays.len(),
            ..FrameStats::default()
        };
        for command in &frame.commands {
            match command {
                DrawCommand::Image { .. } => stats.images += 1,
                DrawCommand::Fill { .. } => stats.fills += 1,
                DrawCommand::Stroke { .. } => stats.strokes += 1,
                DrawCommand::Text(_) => stats.texts += 1,
            }
        }
        stats
    }
}

/// Renderer that records frame statistics instead of drawing.
///
/// Used by headless hosts.
#[derive(Debug, Default)]
pub struct StatsRenderer {
    frames: u64,
    last: FrameStats,
}

impl StatsRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of frames built so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn last(&self) -> FrameStats {
        self.last
    }
}

impl Renderer for StatsRenderer {
    fn build_scene(&mut self, ctx: &RenderContext) {
        self.frames += 1;
        self.last = FrameStats::of(ctx.frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameBuilder;
    use layoutboard_core::scene::LayoutSnapshot;
    use layoutboard_core::{InteractionFlags, Item, Mode, SceneModel, Viewer, ViewTransform};

    #[test]
    fn test_stats_renderer_counts_commands() {
        let scene = SceneModel::from_snapshot(LayoutSnapshot {
            background: None,
            items: vec![Item::project("A1", 0.0, 0.0), Item::project("B2", 300.0, 0.0)],
        });
        let view = ViewTransform::new();
        let viewer = Viewer::admin("alice");
        let flags = InteractionFlags { viewer: &viewer, highlighted: None, mode: Mode::Remove };
        let frame = FrameBuilder::new(&scene, &view, flags)
            .with_viewport(Size::new(800.0, 600.0))
            .build();

        let mut renderer = StatsRenderer::new();
        let ctx = RenderContext::new(&frame).with_scale_factor(2.0);
        assert_eq!(ctx.physical_size(), Size::new(1600.0, 1200.0));
        renderer.build_scene(&ctx);

        let stats = renderer.last();
        assert_eq!(renderer.frames(), 1);
        assert_eq!(stats.items, 2);
        assert_eq!(stats.overlays, 2);
        assert_eq!(stats.images, 0);
        // Body stroke per item.
        assert_eq!(stats.strokes, 2);
        // Name and worker line per item.
        assert_eq!(stats.texts, 4);
    }
}
