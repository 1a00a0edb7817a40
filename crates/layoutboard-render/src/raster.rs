//! Background raster decoding.

use crate::renderer::{RenderResult, RendererError};
use layoutboard_core::remote::Raster;

/// Decode PNG, JPEG or WebP bytes into an RGBA8 raster.
pub fn decode_raster(bytes: &[u8]) -> RenderResult<Raster> {
    let decoded = ::image::load_from_memory(bytes).map_err(|e| RendererError::ImageDecode(e.to_string()))?;
    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();
    log::debug!("Decoded background raster {width}x{height}");
    Raster::new(width, height, rgba.into_vec())
        .ok_or_else(|| RendererError::ImageDecode(format!("pixel buffer does not match {width}x{height}")))
}
