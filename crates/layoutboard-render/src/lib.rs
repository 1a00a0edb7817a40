//! Layoutboard Render Library
//!
//! Turns the engine's scene and interaction state into a backend-neutral
//! display list, and draws that list. The default backend uses Vello; headless
//! hosts can use [`StatsRenderer`] with the `vello-renderer` feature disabled.

pub mod frame;
mod raster;
mod renderer;
pub mod style;

#[cfg(feature = "vello-renderer")]
mod vello_impl;

pub use frame::{Badge, DrawCommand, DrawShape, Frame, FrameBuilder, ItemVisual, StatusIcon, TextRun};
pub use raster::decode_raster;
pub use renderer::{FrameStats, RenderContext, RenderResult, Renderer, RendererError, StatsRenderer};

#[cfg(feature = "vello-renderer")]
pub use vello_impl::VelloRenderer;
