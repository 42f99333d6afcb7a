//! RAM-backed [`Display`] implementation.
//!
//! Holds a canvas plus any number of off-screen surfaces, all tightly
//! packed canonical 32-bit rows. Used by the replay tool and as the
//! display double in tests.

use slotmap::SlotMap;
use tracing::debug;

use crate::bitmap::format::PixelBuffer;
use crate::display::{Display, SurfaceId, Target};
use crate::error::TileError;

const BPP: usize = 4;

/// Largest width or height of any surface, canvas included.
pub const MAX_SURFACE_DIMENSION: u32 = 16_384;

// ── Surface ──────────────────────────────────────────────────────

/// A canonical-format pixel plane.
#[derive(Debug, Clone)]
pub struct Surface {
    width: u32,
    height: u32,
    pixels: PixelBuffer,
}

impl Surface {
    /// Create a black (all-zero) surface.
    ///
    /// Fails with [`TileError::SurfaceAllocation`] when either side exceeds
    /// [`MAX_SURFACE_DIMENSION`] or the backing memory cannot be reserved.
    pub fn new(width: u32, height: u32) -> Result<Self, TileError> {
        let refuse = |reason: String| TileError::SurfaceAllocation {
            width,
            height,
            reason,
        };
        if width > MAX_SURFACE_DIMENSION || height > MAX_SURFACE_DIMENSION {
            return Err(refuse(format!(
                "exceeds {MAX_SURFACE_DIMENSION}x{MAX_SURFACE_DIMENSION} limit"
            )));
        }
        let len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|count| count.checked_mul(BPP))
            .ok_or_else(|| refuse("size overflows".into()))?;
        let pixels = PixelBuffer::try_zeroed(len).map_err(|e| refuse(e.to_string()))?;
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row pitch in bytes.
    pub fn stride(&self) -> usize {
        self.width as usize * BPP
    }

    /// Raw canonical bytes, `stride * height` long.
    pub fn as_bytes(&self) -> &[u8] {
        self.pixels.as_bytes()
    }

    /// Canonical bytes of the pixel at `(x, y)`, if in bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = y as usize * self.stride() + x as usize * BPP;
        let px = &self.as_bytes()[offset..offset + BPP];
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Copy out the `width x height` region at `(x, y)`, tightly packed.
    pub fn region(&self, x: u32, y: u32, width: u32, height: u32) -> Vec<u8> {
        let (w, h) = clip(self, x, y, width, height);
        let row_bytes = w as usize * BPP;
        let mut out = Vec::with_capacity(row_bytes * h as usize);
        for row in 0..h as usize {
            let start = (y as usize + row) * self.stride() + x as usize * BPP;
            out.extend_from_slice(&self.as_bytes()[start..start + row_bytes]);
        }
        out
    }

    /// Write a pixel rectangle, clipped to this surface.
    fn write(
        &mut self,
        src: &[u8],
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        src_stride: usize,
    ) -> Result<(), TileError> {
        if width == 0 || height == 0 {
            return Ok(());
        }

        let needed = (height as usize - 1)
            .checked_mul(src_stride)
            .and_then(|rows| rows.checked_add((width as usize).checked_mul(BPP)?));
        match needed {
            Some(needed) if src.len() >= needed => {}
            _ => {
                return Err(TileError::BufferTooShort {
                    needed: needed.unwrap_or(usize::MAX),
                    actual: src.len(),
                });
            }
        }

        let (w, h) = clip(self, x, y, width, height);
        let row_bytes = w as usize * BPP;
        let dst_stride = self.stride();
        let dst = self.pixels.as_bytes_mut();

        for row in 0..h as usize {
            let s = row * src_stride;
            let d = (y as usize + row) * dst_stride + x as usize * BPP;
            dst[d..d + row_bytes].copy_from_slice(&src[s..s + row_bytes]);
        }
        Ok(())
    }
}

/// Size of the part of `width x height` at `(x, y)` that lies on `surface`.
fn clip(surface: &Surface, x: u32, y: u32, width: u32, height: u32) -> (u32, u32) {
    let w = width.min(surface.width.saturating_sub(x));
    let h = height.min(surface.height.saturating_sub(y));
    (w, h)
}

// ── MemoryDisplay ────────────────────────────────────────────────

/// In-memory display with an optional cap on live off-screen surfaces.
#[derive(Debug)]
pub struct MemoryDisplay {
    canvas: Surface,
    surfaces: SlotMap<SurfaceId, Surface>,
    max_surfaces: Option<usize>,
    allocated: u64,
    freed: u64,
}

impl MemoryDisplay {
    /// Create a display with a `width x height` canvas and no surface cap.
    ///
    /// # Panics
    ///
    /// If the canvas cannot be allocated. Use [`MemoryDisplay::try_new`]
    /// for sizes that come from outside the program.
    pub fn new(width: u32, height: u32) -> Self {
        match Self::try_new(width, height) {
            Ok(display) => display,
            Err(e) => panic!("canvas allocation failed: {e}"),
        }
    }

    /// Create a display, reporting an unusable canvas size as an error.
    pub fn try_new(width: u32, height: u32) -> Result<Self, TileError> {
        Ok(Self {
            canvas: Surface::new(width, height)?,
            surfaces: SlotMap::with_key(),
            max_surfaces: None,
            allocated: 0,
            freed: 0,
        })
    }

    /// Cap the number of simultaneously live off-screen surfaces.
    /// Allocation beyond the cap fails with [`TileError::SurfaceAllocation`].
    pub fn with_max_surfaces(mut self, max: Option<usize>) -> Self {
        self.max_surfaces = max;
        self
    }

    pub fn canvas(&self) -> &Surface {
        &self.canvas
    }

    pub fn surface(&self, id: SurfaceId) -> Option<&Surface> {
        self.surfaces.get(id)
    }

    /// Number of live off-screen surfaces.
    pub fn live_surfaces(&self) -> usize {
        self.surfaces.len()
    }

    /// Total surfaces allocated since creation.
    pub fn allocated(&self) -> u64 {
        self.allocated
    }

    /// Total surfaces released since creation.
    pub fn freed(&self) -> u64 {
        self.freed
    }

    fn target_mut(&mut self, target: Target) -> Result<&mut Surface, TileError> {
        match target {
            Target::Canvas => Ok(&mut self.canvas),
            Target::Surface(id) => self.surfaces.get_mut(id).ok_or(TileError::UnknownSurface),
        }
    }
}

impl Display for MemoryDisplay {
    fn alloc_surface(&mut self, width: u32, height: u32) -> Result<SurfaceId, TileError> {
        if let Some(max) = self.max_surfaces {
            if self.surfaces.len() >= max {
                return Err(TileError::SurfaceAllocation {
                    width,
                    height,
                    reason: format!("surface budget of {max} exhausted"),
                });
            }
        }

        let id = self.surfaces.insert(Surface::new(width, height)?);
        self.allocated += 1;
        debug!(?id, "allocated {width}x{height} surface");
        Ok(id)
    }

    fn free_surface(&mut self, id: SurfaceId) -> Result<(), TileError> {
        self.surfaces.remove(id).ok_or(TileError::UnknownSurface)?;
        self.freed += 1;
        debug!(?id, "freed surface");
        Ok(())
    }

    fn draw(
        &mut self,
        target: Target,
        pixels: &[u8],
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        stride: usize,
    ) -> Result<(), TileError> {
        self.target_mut(target)?
            .write(pixels, x, y, width, height, stride)
    }

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
    ) -> Result<(), TileError> {
        // Staging through a temporary makes overlapping self-copies safe.
        let source = self.surfaces.get(src).ok_or(TileError::UnknownSurface)?;
        let (w, h) = clip(source, sx, sy, width, height);
        let staged = source.region(sx, sy, w, h);

        self.target_mut(dst)?
            .write(&staged, dx, dy, w, h, w as usize * BPP)
    }
}

// ── Tests ────────────────────────────────────────────────────────
