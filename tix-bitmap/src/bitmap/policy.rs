//! Promotion of tiles into off-screen surfaces.
//!
//! A tile's first composite is always served from its transient pixel
//! buffer. Once a tile has been drawn at least `min_reuse` times it is
//! worth a surface of its own: the next composite materializes it and
//! every later one is a surface-to-surface copy. There is no eviction;
//! a promoted tile keeps its surface until it is destroyed.

use tracing::{debug, warn};

use crate::bitmap::tile::BitmapTile;
use crate::display::{Display, SurfaceId, Target};
use crate::error::TileError;

// ── PromotionPolicy ──────────────────────────────────────────────

/// Decides whether a tile should be materialized before it is drawn.
pub trait PromotionPolicy {
    /// Called at the start of every composite request. Only consulted
    /// for tiles that have no surface yet.
    fn should_promote(&self, tile: &BitmapTile) -> bool;
}

/// Promote once a tile has been composited `min_reuse` times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReuseThreshold {
    pub min_reuse: u32,
}

impl ReuseThreshold {
    pub fn new(min_reuse: u32) -> Self {
        Self { min_reuse }
    }
}

impl Default for ReuseThreshold {
    /// Promote on the second composite.
    fn default() -> Self {
        Self { min_reuse: 1 }
    }
}

impl PromotionPolicy for ReuseThreshold {
    fn should_promote(&self, tile: &BitmapTile) -> bool {
        !tile.is_promoted() && tile.reuse_count() >= self.min_reuse
    }
}

// ── Promotion ────────────────────────────────────────────────────

/// Materialize `tile` into a fresh surface from `display`.
///
/// The retained pixels (if any) are drawn into the surface in one blit.
/// If that blit fails the surface is released again and the tile stays
/// unpromoted. Already-promoted tiles return their existing surface.
pub fn promote<D: Display + ?Sized>(
    display: &mut D,
    tile: &mut BitmapTile,
    drop_pixels: bool,
) -> Result<SurfaceId, TileError> {
    if let Some(id) = tile.surface() {
        return Ok(id);
    }

    let (width, height) = (tile.width(), tile.height());
    let id = display.alloc_surface(width, height)?;

    if let Some(pixels) = tile.pixels() {
        let drawn = display.draw(
            Target::Surface(id),
            pixels.as_bytes(),
            0,
            0,
            width,
            height,
            tile.stride(),
        );
        if let Err(e) = drawn {
            if let Err(free_err) = display.free_surface(id) {
                warn!(?id, "failed to release unfilled surface: {free_err}");
            }
            return Err(e);
        }
    }

    tile.attach_surface(id);
    if drop_pixels {
        tile.drop_pixels();
    }
    debug!(?id, "promoted {width}x{height} tile after {} uses", tile.reuse_count());
    Ok(id)
}

/// Run `policy` against `tile` and promote when it says so.
///
/// Returns `Ok(true)` when this call created the surface.
pub fn maybe_promote<D: Display + ?Sized, P: PromotionPolicy + ?Sized>(
    policy: &P,
    display: &mut D,
    tile: &mut BitmapTile,
    drop_pixels: bool,
) -> Result<bool, TileError> {
    if tile.is_promoted() || !policy.should_promote(tile) {
        return Ok(false);
    }
    promote(display, tile, drop_pixels).map(|_| true)
}

// ── Tests ────────────────────────────────────────────────────────
