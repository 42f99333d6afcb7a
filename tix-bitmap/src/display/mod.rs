//! The display collaborator: canvas and off-screen surface allocation.
//!
//! The bitmap cache never owns pixels on screen. It asks a [`Display`]
//! for off-screen surfaces when a tile is promoted and issues blits
//! against whichever [`Target`] is currently active.
//!
//! | Item            | Purpose                                       |
//! |-----------------|-----------------------------------------------|
//! | `Display`       | Allocation and blit interface the cache calls |
//! | `SurfaceId`     | Handle to an off-screen surface               |
//! | `Target`        | Canvas or off-screen surface receiving draws  |
//! | `MemoryDisplay` | In-process implementation backed by RAM       |

pub mod memory;

pub use memory::{MAX_SURFACE_DIMENSION, MemoryDisplay, Surface};

use crate::error::TileError;

slotmap::new_key_type! {
    /// Handle to an off-screen surface owned by a [`Display`].
    pub struct SurfaceId;
}

/// Destination of composite draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Target {
    /// The primary canvas (the live remote-desktop frame).
    #[default]
    Canvas,
    /// An off-screen surface selected as a secondary target.
    Surface(SurfaceId),
}

/// Surface allocator and blitter consumed by the bitmap cache.
///
/// All pixels are in the canonical 32-bit format. Implementations clip
/// blits to the destination. Calls are synchronous; an implementation
/// shared with an output thread must provide its own synchronisation.
pub trait Display {
    /// Allocate an off-screen surface of `width x height`.
    fn alloc_surface(&mut self, width: u32, height: u32) -> Result<SurfaceId, TileError>;

    /// Release a surface. Called at most once per id.
    fn free_surface(&mut self, id: SurfaceId) -> Result<(), TileError>;

    /// Blit a `width x height` pixel rectangle from `pixels` (rows
    /// `stride` bytes apart) onto `target` at `(x, y)`.
    #[allow(clippy::too_many_arguments)]
    fn draw(
        &mut self,
        target: Target,
        pixels: &[u8],
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        stride: usize,
    ) -> Result<(), TileError>;

    /// Copy the `width x height` rectangle at `(sx, sy)` of surface `src`
    /// onto `dst` at `(dx, dy)`. `dst` may be `src` itself.
    #[allow(clippy::too_many_arguments)]
    fn copy(
        &mut self,
        src: SurfaceId,
        sx: u32,
        sy: u32,
        width: u32,
        height: u32,
        dst: Target,
        dx: u32,
        dy: u32,
    ) -> Result<(), TileError>;
}
