//! Vello-based renderer implementation.

use crate::frame::{DrawCommand, DrawShape, TextAlign, TextBaseline, TextRun, TextWeight};
use crate::renderer::{RenderContext, Renderer};
use kurbo::{Affine, Rect, Stroke};
use layoutboard_core::remote::Raster;
use parley::layout::PositionedLayoutItem;
use parley::{FontContext, LayoutContext, StyleProperty};
use peniko::{Brush, Color, Fill};
use std::collections::HashMap;
use vello::Scene;

/// Vello-based renderer for GPU-accelerated 2D graphics.
pub struct VelloRenderer {
    /// The Vello scene being built.
    scene: Scene,
    /// Font context for text rendering, backed by system fonts.
    font_cx: FontContext,
    /// Layout context for text rendering.
    layout_cx: LayoutContext<Brush>,
    /// Decoded background images keyed by image path.
    image_cache: HashMap<String, peniko::ImageData>,
}

impl Default for VelloRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl VelloRenderer {
    /// Create a new Vello renderer.
    pub fn new() -> Self {
        Self {
            scene: Scene::new(),
            font_cx: FontContext::new(),
            layout_cx: LayoutContext::new(),
            image_cache: HashMap::new(),
        }
    }

    /// Get the built scene for rendering.
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    fn fill_shape(&mut self, shape: &DrawShape, transform: Affine, color: Color) {
        match shape {
            DrawShape::Rect(r) => self.scene.fill(Fill::NonZero, transform, color, None, r),
            DrawShape::RoundedRect(r) => self.scene.fill(Fill::NonZero, transform, color, None, r),
            DrawShape::Circle(c) => self.scene.fill(Fill::NonZero, transform, color, None, c),
            DrawShape::Path(p) => self.scene.fill(Fill::NonZero, transform, color, None, p),
        }
    }

    fn stroke_shape(&mut self, shape: &DrawShape, transform: Affine, color: Color, width: f64) {
        let stroke = Stroke::new(width);
        match shape {
            DrawShape::Rect(r) => self.scene.stroke(&stroke, transform, color, None, r),
            DrawShape::RoundedRect(r) => self.scene.stroke(&stroke, transform, color, None, r),
            DrawShape::Circle(c) => self.scene.stroke(&stroke, transform, color, None, c),
            DrawShape::Path(p) => self.scene.stroke(&stroke, transform, color, None, p),
        }
    }

    /// Render a background raster stretched over a world rectangle.
    fn render_image(&mut self, key: &str, raster: &Raster, rect: Rect, transform: Affine) {
        if raster.width == 0 || raster.height == 0 {
            return;
        }
        let image_data = self
            .image_cache
            .entry(key.to_string())
            .or_insert_with(|| {
                log::debug!("Uploading background {key} ({}x{})", raster.width, raster.height);
                peniko::ImageData {
                    data: peniko::Blob::new(raster.rgba.clone()),
                    format: peniko::ImageFormat::Rgba8,
                    width: raster.width,
                    height: raster.height,
                    alpha_type: peniko::ImageAlphaType::Alpha,
                }
            })
            .clone();

        let scale_x = rect.width() / f64::from(image_data.width);
        let scale_y = rect.height() / f64::from(image_data.height);
        let image_transform =
            transform * Affine::translate((rect.x0, rect.y0)) * Affine::scale_non_uniform(scale_x, scale_y);

        self.scene.draw_image(&image_data.into(), image_transform);
    }

    /// Render a text run using Parley for layout.
    fn render_text(&mut self, run: &TextRun, transform: Affine) {
        if run.text.is_empty() {
            return;
        }
        let brush = Brush::Solid(run.color);
        let weight = match run.weight {
            TextWeight::Regular => parley::FontWeight::NORMAL,
            TextWeight::SemiBold => parley::FontWeight::SEMI_BOLD,
            TextWeight::Bold => parley::FontWeight::BOLD,
        };

        let mut builder = self.layout_cx.ranged_builder(&mut self.font_cx, &run.text, 1.0, false);
        builder.push_default(StyleProperty::FontSize(run.size as f32));
        builder.push_default(StyleProperty::Brush(brush.clone()));
        builder.push_default(StyleProperty::FontWeight(weight));
        builder.push_default(StyleProperty::FontStack(parley::FontStack::Single(
            parley::FontFamily::Generic(parley::GenericFamily::SansSerif),
        )));
        let mut layout = builder.build(&run.text);
        layout.break_all_lines(None);
        layout.align(None, parley::Alignment::Start, parley::AlignmentOptions::default());

        let width = f64::from(layout.width());
        let height = f64::from(layout.height());
        let squeeze = match run.max_width {
            Some(max) if width > max && width > 0.0 => max / width,
            _ => 1.0,
        };
        let drawn_width = width * squeeze;
        let x = match run.align {
            TextAlign::Start => run.origin.x,
            TextAlign::Center => run.origin.x - drawn_width / 2.0,
            TextAlign::End => run.origin.x - drawn_width,
        };
        let y = match run.baseline {
            TextBaseline::Top => run.origin.y,
            TextBaseline::Bottom => run.origin.y - height,
        };
        let text_transform = transform * Affine::translate((x, y)) * Affine::scale_non_uniform(squeeze, 1.0);

        for line in layout.lines() {
            for item in line.items() {
                let PositionedLayoutItem::GlyphRun(glyph_run) = item else {
                    continue;
                };
                let mut gx = glyph_run.offset();
                let gy = glyph_run.baseline();
                let text_run = glyph_run.run();
                let font = text_run.font();
                let font_size = text_run.font_size();
                let glyph_xform = text_run
                    .synthesis()
                    .skew()
                    .map(|angle| Affine::skew(angle.to_radians().tan() as f64, 0.0));

                let glyphs: Vec<vello::Glyph> = glyph_run
                    .glyphs()
                    .map(|glyph| {
                        let positioned = vello::Glyph {
                            id: glyph.id,
                            x: gx + glyph.x,
                            y: gy - glyph.y,
                        };
                        gx += glyph.advance;
                        positioned
                    })
                    .collect();

                if !glyphs.is_empty() {
                    self.scene
                        .draw_glyphs(font)
                        .brush(&brush)
                        .hint(true)
                        .transform(text_transform)
                        .glyph_transform(glyph_xform)
                        .font_size(font_size)
                        .normalized_coords(text_run.normalized_coords())
                        .draw(Fill::NonZero, glyphs.into_iter());
                }
            }
        }
    }
}

impl Renderer for VelloRenderer {
    fn build_scene(&mut self, ctx: &RenderContext) {
        self.scene.reset();
        let frame = ctx.frame;
        let transform = Affine::scale(ctx.scale_factor) * frame.transform;

        let viewport = Rect::from_origin_size((0.0, 0.0), frame.viewport);
        if viewport.area() > 0.0 {
            let clear = self.background_color(ctx);
            self.scene
                .fill(Fill::NonZero, Affine::scale(ctx.scale_factor), clear, None, &viewport);
        }

        for command in &frame.commands {
            match command {
                DrawCommand::Image { key, raster, rect } => self.render_image(key, raster, *rect, transform),
                DrawCommand::Fill { shape, color } => self.fill_shape(shape, transform, *color),
                DrawCommand::Stroke { shape, color, width } => self.stroke_shape(shape, transform, *color, *width),
                DrawCommand::Text(run) => self.render_text(run, transform),
            }
        }

        // Drop rasters no longer referenced by the scene.
        let live: Vec<&str> = frame
            .commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Image { key, .. } => Some(key.as_str()),
                _ => None,
            })
            .collect();
        self.image_cache.retain(|key, _| live.contains(&key.as_str()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameBuilder;
    use kurbo::Size;
    use layoutboard_core::scene::LayoutSnapshot;
    use layoutboard_core::{InteractionFlags, Item, Mode, SceneModel, Viewer, ViewTransform};

    #[test]
    fn test_renderer_creation() {
        let renderer = VelloRenderer::new();
        assert!(renderer.scene().encoding().is_empty());
    }

    #[test]
    fn test_build_scene_with_items() {
        let scene = SceneModel::from_snapshot(LayoutSnapshot {
            background: None,
            items: vec![Item::project("A1", 0.0, 0.0)],
        });
        let view = ViewTransform::new();
        let viewer = Viewer::member("guest");
        let flags = InteractionFlags { viewer: &viewer, highlighted: None, mode: Mode::Default };
        let frame = FrameBuilder::new(&scene, &view, flags)
            .with_viewport(Size::new(800.0, 600.0))
            .build();

        let mut renderer = VelloRenderer::new();
        renderer.build_scene(&RenderContext::new(&frame));
        assert!(!renderer.scene().encoding().is_empty());
    }
}
