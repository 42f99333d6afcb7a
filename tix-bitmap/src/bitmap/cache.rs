//! The per-session bitmap cache and compositor.
//!
//! [`BitmapCache`] owns every live tile, the [`Display`] collaborator and
//! the active compositing target. All operations take `&mut self` and run
//! on the thread that drives the session's bitmap commands; nothing here
//! blocks or locks.
//!
//! ```text
//! create_tile ──► BitmapTile (normalized, unpromoted)
//!                     │
//! composite_tile ─────┼─► policy says promote? ──► Display::alloc_surface
//!                     │                            + one-shot draw
//!                     ├─► surface?  ──► Display::copy  ──► active target
//!                     └─► pixels?   ──► Display::draw  ──► active target
//!
//! select_target(false, tile) ──► forced promotion ──► target = tile surface
//! destroy_tile ──► Display::free_surface (once)
//! ```

use slotmap::SlotMap;
use tracing::{debug, info, warn};

use crate::bitmap::format::{Palette, PixelFormat};
use crate::bitmap::policy::{self, PromotionPolicy, ReuseThreshold};
use crate::bitmap::tile::{BitmapTile, Rect};
use crate::config::CacheConfig;
use crate::display::{Display, SurfaceId, Target};
use crate::error::TileError;

slotmap::new_key_type! {
    /// Opaque handle to a tile owned by a [`BitmapCache`].
    pub struct TileHandle;
}

// ── CacheStats ───────────────────────────────────────────────────

/// Counters describing cache behaviour over a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub tiles_created: u64,
    pub tiles_destroyed: u64,
    /// Tiles whose data could not be normalized and were kept as-is.
    pub conversions_failed: u64,
    pub promotions: u64,
    pub failed_promotions: u64,
    /// Composites served from a materialized surface.
    pub cached_draws: u64,
    /// Composites served from a transient pixel buffer.
    pub direct_draws: u64,
    /// Composites that had nothing to draw.
    pub empty_draws: u64,
}

// ── BitmapCache ──────────────────────────────────────────────────

/// Reuse-driven bitmap cache bound to one display.
pub struct BitmapCache<D: Display, P: PromotionPolicy = ReuseThreshold> {
    display: D,
    policy: P,
    tiles: SlotMap<TileHandle, BitmapTile>,
    target: Target,
    palette: Option<Palette>,
    drop_pixels_on_promotion: bool,
    stats: CacheStats,
}

impl<D: Display> BitmapCache<D> {
    /// Create a cache with default settings.
    pub fn new(display: D) -> Self {
        Self::with_policy(display, ReuseThreshold::default(), false)
    }

    /// Create a cache from a validated [`CacheConfig`].
    pub fn with_config(display: D, config: &CacheConfig) -> Result<Self, TileError> {
        config.validate()?;
        Ok(Self::with_policy(
            display,
            ReuseThreshold::new(config.promote_after),
            config.drop_pixels_on_promotion,
        ))
    }
}

impl<D: Display, P: PromotionPolicy> BitmapCache<D, P> {
    /// Create a cache with a custom promotion policy.
    pub fn with_policy(display: D, policy: P, drop_pixels_on_promotion: bool) -> Self {
        Self {
            display,
            policy,
            tiles: SlotMap::with_key(),
            target: Target::Canvas,
            palette: None,
            drop_pixels_on_promotion,
            stats: CacheStats::default(),
        }
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut D {
        &mut self.display
    }

    /// The surface currently receiving composites.
    pub fn active_target(&self) -> Target {
        self.target
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    pub fn tile(&self, handle: TileHandle) -> Option<&BitmapTile> {
        self.tiles.get(handle)
    }

    /// Number of live tiles.
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Install the session palette used to expand indexed tiles created
    /// from now on.
    pub fn set_palette(&mut self, palette: Palette) {
        debug!("session palette updated ({} entries)", palette.len());
        self.palette = Some(palette);
    }

    // ── Tile lifecycle ───────────────────────────────────────────

    /// Register a new tile, normalizing its pixel data.
    pub fn create_tile(
        &mut self,
        width: u32,
        height: u32,
        data: Option<Vec<u8>>,
        format: PixelFormat,
    ) -> Result<TileHandle, TileError> {
        let has_data = data.is_some();
        let tile = BitmapTile::new(width, height, data, format, self.palette.as_ref())?;

        if has_data && !tile.is_normalized() {
            self.stats.conversions_failed += 1;
        }
        self.stats.tiles_created += 1;
        Ok(self.tiles.insert(tile))
    }

    /// Destroy a tile and release its surface.
    ///
    /// Destroying an unknown or already destroyed handle is a no-op. If
    /// the tile's surface is the active target, the canvas becomes active.
    pub fn destroy_tile(&mut self, handle: TileHandle) {
        let Some(mut tile) = self.tiles.remove(handle) else {
            debug!(?handle, "destroy of unknown tile ignored");
            return;
        };
        self.stats.tiles_destroyed += 1;

        if let Some(id) = tile.take_surface() {
            if self.target == Target::Surface(id) {
                debug!(?id, "active surface destroyed; reverting to canvas");
                self.target = Target::Canvas;
            }
            self.release_surface(id);
        }
    }

    // ── Compositing ──────────────────────────────────────────────

    /// Draw a tile onto the active target at `(dest_x, dest_y)`.
    ///
    /// `bounds` only determines the size of the drawn region; the source
    /// region always starts at the tile's origin and is clamped to the
    /// tile. Promotion and blit failures are logged and degrade to an
    /// unpromoted or empty draw. The tile's reuse count is incremented on
    /// every accepted request.
    pub fn composite_tile(
        &mut self,
        handle: TileHandle,
        bounds: Rect,
        dest_x: u32,
        dest_y: u32,
    ) -> Result<(), TileError> {
        let (width, height) = bounds
            .size()
            .ok_or(TileError::MalformedRequest("inverted paint bounds"))?;
        let tile = self.tiles.get_mut(handle).ok_or(TileError::UnknownTile)?;

        match policy::maybe_promote(
            &self.policy,
            &mut self.display,
            tile,
            self.drop_pixels_on_promotion,
        ) {
            Ok(true) => self.stats.promotions += 1,
            Ok(false) => {}
            Err(e) => {
                self.stats.failed_promotions += 1;
                warn!(?handle, "promotion failed, drawing unpromoted: {e}");
            }
        }

        let width = width.min(tile.width());
        let height = height.min(tile.height());

        let drawn = if let Some(surface) = tile.surface() {
            self.stats.cached_draws += 1;
            self.display
                .copy(surface, 0, 0, width, height, self.target, dest_x, dest_y)
        } else if let Some(pixels) = tile.pixels() {
            self.stats.direct_draws += 1;
            self.display.draw(
                self.target,
                pixels.as_bytes(),
                dest_x,
                dest_y,
                width,
                height,
                tile.stride(),
            )
        } else {
            self.stats.empty_draws += 1;
            debug!(?handle, "tile has neither surface nor pixels; nothing drawn");
            Ok(())
        };

        if let Err(e) = drawn {
            warn!(?handle, "composite at ({dest_x}, {dest_y}) failed: {e}");
        }

        tile.record_use();
        Ok(())
    }

    // ── Target redirection ───────────────────────────────────────

    /// Redirect subsequent composites.
    ///
    /// `primary` selects the canvas. Otherwise `tile` becomes the target,
    /// promoting it first if needed regardless of its reuse count. A
    /// missing or stale tile is logged and ignored. If the forced
    /// promotion fails, the error is returned and the target is unchanged.
    pub fn select_target(
        &mut self,
        primary: bool,
        tile: Option<TileHandle>,
    ) -> Result<(), TileError> {
        if primary {
            self.target = Target::Canvas;
            return Ok(());
        }

        let Some(handle) = tile else {
            info!("null bitmap in set-surface request; ignoring");
            return Ok(());
        };
        let Some(record) = self.tiles.get_mut(handle) else {
            info!(?handle, "set-surface names a destroyed bitmap; ignoring");
            return Ok(());
        };

        let surface = match record.surface() {
            Some(id) => id,
            None => {
                match policy::promote(&mut self.display, record, self.drop_pixels_on_promotion) {
                    Ok(id) => {
                        self.stats.promotions += 1;
                        id
                    }
                    Err(e) => {
                        self.stats.failed_promotions += 1;
                        warn!(?handle, "cannot materialize bitmap as draw target: {e}");
                        return Err(e);
                    }
                }
            }
        };

        self.target = Target::Surface(surface);
        Ok(())
    }

    // ── Internal ─────────────────────────────────────────────────

    fn release_surface(&mut self, id: SurfaceId) {
        if let Err(e) = self.display.free_surface(id) {
            warn!(?id, "failed to free surface: {e}");
        }
    }
}

impl<D: Display, P: PromotionPolicy> Drop for BitmapCache<D, P> {
    fn drop(&mut self) {
        let surfaces: Vec<SurfaceId> = self
            .tiles
            .values_mut()
            .filter_map(BitmapTile::take_surface)
            .collect();
        for id in surfaces {
            self.release_surface(id);
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
