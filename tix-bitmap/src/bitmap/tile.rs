//! Bitmap tiles: one remote-desktop image rectangle each.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::bitmap::format::{Palette, PixelBuffer, PixelFormat, normalize};
use crate::display::SurfaceId;
use crate::error::TileError;

// ── Rect ─────────────────────────────────────────────────────────

/// Inclusive paint bounds supplied with a composite request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl Rect {
    pub fn new(left: u32, top: u32, right: u32, bottom: u32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Bounds covering a `width x height` area at the origin.
    pub fn from_size(width: u32, height: u32) -> Self {
        Self::new(0, 0, width.saturating_sub(1), height.saturating_sub(1))
    }

    /// Draw size `(right - left + 1, bottom - top + 1)`.
    ///
    /// Returns `None` for inverted bounds.
    pub fn size(&self) -> Option<(u32, u32)> {
        let width = self.right.checked_sub(self.left)?.checked_add(1)?;
        let height = self.bottom.checked_sub(self.top)?.checked_add(1)?;
        Some((width, height))
    }
}

// ── BitmapTile ───────────────────────────────────────────────────

/// Cache state for a single bitmap.
///
/// Pixel data is normalized once, at creation. The tile starts with no
/// surface and a zero reuse count; promotion attaches a surface exactly
/// once and it stays attached until the tile is destroyed.
#[derive(Debug)]
pub struct BitmapTile {
    width: u32,
    height: u32,
    format: PixelFormat,
    pixels: Option<PixelBuffer>,
    reuse_count: u32,
    surface: Option<SurfaceId>,
}

impl BitmapTile {
    /// Create a tile, normalizing `data` to the canonical format.
    ///
    /// A failed conversion is not an error: the tile keeps the original
    /// bytes and format and a warning is logged.
    pub fn new(
        width: u32,
        height: u32,
        data: Option<Vec<u8>>,
        format: PixelFormat,
        palette: Option<&Palette>,
    ) -> Result<Self, TileError> {
        if width == 0 || height == 0 {
            return Err(TileError::InvalidDimensions { width, height });
        }

        let mut stored_format = format;
        let pixels = match data {
            None => None,
            Some(raw) if format.is_canonical() => Some(PixelBuffer::from_bytes(&raw)),
            Some(raw) => match normalize(&raw, width, height, format, palette) {
                Ok(converted) => {
                    stored_format = PixelFormat::CANONICAL;
                    Some(converted)
                }
                Err(e) => {
                    warn!("{width}x{height} {format:?} tile kept unconverted: {e}");
                    Some(PixelBuffer::from_bytes(&raw))
                }
            },
        };

        Ok(Self {
            width,
            height,
            format: stored_format,
            pixels,
            reuse_count: 0,
            surface: None,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Format of the retained pixel data.
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Whether the retained pixels are in the canonical format.
    pub fn is_normalized(&self) -> bool {
        self.format.is_canonical()
    }

    pub fn pixels(&self) -> Option<&PixelBuffer> {
        self.pixels.as_ref()
    }

    /// Source row stride in bytes. Always the tile's full width, even when
    /// a composite draws a narrower region.
    pub fn stride(&self) -> usize {
        self.width as usize * 4
    }

    /// Number of composite requests served so far.
    pub fn reuse_count(&self) -> u32 {
        self.reuse_count
    }

    pub fn surface(&self) -> Option<SurfaceId> {
        self.surface
    }

    pub fn is_promoted(&self) -> bool {
        self.surface.is_some()
    }

    pub(crate) fn record_use(&mut self) {
        self.reuse_count = self.reuse_count.saturating_add(1);
    }

    pub(crate) fn attach_surface(&mut self, id: SurfaceId) {
        debug_assert!(self.surface.is_none(), "tile promoted twice");
        self.surface = Some(id);
    }

    /// Detach the surface so the owner can release it.
    pub(crate) fn take_surface(&mut self) -> Option<SurfaceId> {
        self.surface.take()
    }

    pub(crate) fn drop_pixels(&mut self) {
        self.pixels = None;
    }
}

// ── Tests ────────────────────────────────────────────────────────
