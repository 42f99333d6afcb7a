//! Pixel formats and the normalizer that brings incoming tile data into
//! the canonical layout.
//!
//! Every tile is composited as [`PixelFormat::Xrgb32`]: one little-endian
//! `0x00RRGGBB` word per pixel, i.e. bytes `B, G, R, X` in memory. The
//! X byte carries no meaning and is written as `0xFF`.

use std::collections::TryReserveError;

use serde::{Deserialize, Serialize};

use crate::error::TileError;

// ── PixelFormat ──────────────────────────────────────────────────

/// Pixel layout of a tile's source data.
///
/// 32-bit and 16-bit formats are named from the most significant bit of
/// a little-endian word. 24-bit formats are named by byte order in
/// memory. Rows are tightly packed (`width * bytes_per_pixel` bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// Canonical format: `0x00RRGGBB`.
    Xrgb32,
    /// `0xAARRGGBB`; alpha is discarded.
    Argb32,
    /// `0x00BBGGRR`.
    Xbgr32,
    /// `0xAABBGGRR`; alpha is discarded.
    Abgr32,
    /// `0xBBGGRR00`.
    Bgrx32,
    /// `0xBBGGRRAA`; alpha is discarded.
    Bgra32,
    /// `0xRRGGBB00`.
    Rgbx32,
    /// `0xRRGGBBAA`; alpha is discarded.
    Rgba32,
    /// Bytes `R, G, B`.
    Rgb24,
    /// Bytes `B, G, R`.
    Bgr24,
    /// 5-6-5 with red in the high bits.
    Rgb16,
    /// 5-6-5 with blue in the high bits.
    Bgr16,
    /// x-5-5-5 with red in the high bits.
    Rgb15,
    /// x-5-5-5 with blue in the high bits.
    Bgr15,
    /// One palette index per pixel.
    Indexed8,
}

impl PixelFormat {
    /// The layout every tile is normalized to before compositing.
    pub const CANONICAL: PixelFormat = PixelFormat::Xrgb32;

    /// Bytes consumed by a single pixel in this format.
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Xrgb32
            | PixelFormat::Argb32
            | PixelFormat::Xbgr32
            | PixelFormat::Abgr32
            | PixelFormat::Bgrx32
            | PixelFormat::Bgra32
            | PixelFormat::Rgbx32
            | PixelFormat::Rgba32 => 4,
            PixelFormat::Rgb24 | PixelFormat::Bgr24 => 3,
            PixelFormat::Rgb16 | PixelFormat::Bgr16 | PixelFormat::Rgb15 | PixelFormat::Bgr15 => 2,
            PixelFormat::Indexed8 => 1,
        }
    }

    /// Whether this is the canonical compositing format.
    pub const fn is_canonical(self) -> bool {
        matches!(self, PixelFormat::Xrgb32)
    }

    /// Decode one direct-color pixel into `[r, g, b]`.
    ///
    /// `px` must hold exactly [`bytes_per_pixel`](Self::bytes_per_pixel)
    /// bytes. Indexed pixels need a palette and are handled by
    /// [`Palette::lookup`].
    fn decode_rgb(self, px: &[u8]) -> [u8; 3] {
        match self {
            PixelFormat::Xrgb32 | PixelFormat::Argb32 => {
                let w = word32(px);
                [(w >> 16) as u8, (w >> 8) as u8, w as u8]
            }
            PixelFormat::Xbgr32 | PixelFormat::Abgr32 => {
                let w = word32(px);
                [w as u8, (w >> 8) as u8, (w >> 16) as u8]
            }
            PixelFormat::Bgrx32 | PixelFormat::Bgra32 => {
                let w = word32(px);
                [(w >> 8) as u8, (w >> 16) as u8, (w >> 24) as u8]
            }
            PixelFormat::Rgbx32 | PixelFormat::Rgba32 => {
                let w = word32(px);
                [(w >> 24) as u8, (w >> 16) as u8, (w >> 8) as u8]
            }
            PixelFormat::Rgb24 => [px[0], px[1], px[2]],
            PixelFormat::Bgr24 => [px[2], px[1], px[0]],
            PixelFormat::Rgb16 => {
                let w = word16(px);
                [expand5(w >> 11), expand6(w >> 5), expand5(w)]
            }
            PixelFormat::Bgr16 => {
                let w = word16(px);
                [expand5(w), expand6(w >> 5), expand5(w >> 11)]
            }
            PixelFormat::Rgb15 => {
                let w = word16(px);
                [expand5(w >> 10), expand5(w >> 5), expand5(w)]
            }
            PixelFormat::Bgr15 => {
                let w = word16(px);
                [expand5(w), expand5(w >> 5), expand5(w >> 10)]
            }
            PixelFormat::Indexed8 => unreachable!("indexed pixels are decoded through the palette"),
        }
    }
}

fn word32(px: &[u8]) -> u32 {
    u32::from_le_bytes([px[0], px[1], px[2], px[3]])
}

fn word16(px: &[u8]) -> u16 {
    u16::from_le_bytes([px[0], px[1]])
}

/// Widen a 5-bit channel (low bits of `v`) to 8 bits by bit replication.
fn expand5(v: u16) -> u8 {
    let c = (v & 0x1F) as u8;
    (c << 3) | (c >> 2)
}

/// Widen a 6-bit channel (low bits of `v`) to 8 bits by bit replication.
fn expand6(v: u16) -> u8 {
    let c = (v & 0x3F) as u8;
    (c << 2) | (c >> 4)
}

// ── Palette ──────────────────────────────────────────────────────

/// Colour table used to expand [`PixelFormat::Indexed8`] tiles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    entries: Vec<[u8; 3]>,
}

impl Palette {
    /// Maximum number of entries an 8-bit index can address.
    pub const MAX_ENTRIES: usize = 256;

    /// Build a palette from `[r, g, b]` entries.
    pub fn new(entries: Vec<[u8; 3]>) -> Result<Self, TileError> {
        if entries.len() > Self::MAX_ENTRIES {
            return Err(TileError::MalformedRequest("palette holds more than 256 entries"));
        }
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve an index to `[r, g, b]`.
    pub fn lookup(&self, index: u8) -> Result<[u8; 3], TileError> {
        self.entries.get(index as usize).copied().ok_or_else(|| {
            TileError::FormatConversion(format!(
                "palette index {index} out of range ({} entries)",
                self.entries.len()
            ))
        })
    }
}

// ── PixelBuffer ──────────────────────────────────────────────────

/// One 16-byte storage unit. Keeps the buffer start 16-byte aligned for
/// vectorised blit paths.
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
struct Chunk([u8; 16]);

/// Owned, 16-byte aligned pixel storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    chunks: Vec<Chunk>,
    len: usize,
}

impl PixelBuffer {
    /// Allocate `len` zeroed bytes.
    pub fn zeroed(len: usize) -> Self {
        Self {
            chunks: vec![Chunk([0; 16]); len.div_ceil(16)],
            len,
        }
    }

    /// Allocate `len` zeroed bytes, reporting allocation failure instead
    /// of aborting.
    pub fn try_zeroed(len: usize) -> Result<Self, TryReserveError> {
        let count = len.div_ceil(16);
        let mut chunks = Vec::new();
        chunks.try_reserve_exact(count)?;
        chunks.resize(count, Chunk([0; 16]));
        Ok(Self { chunks, len })
    }

    /// Copy `bytes` into aligned storage.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut buf = Self::zeroed(bytes.len());
        buf.as_bytes_mut().copy_from_slice(bytes);
        buf
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &bytemuck::cast_slice::<Chunk, u8>(&self.chunks)[..self.len]
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut bytemuck::cast_slice_mut::<Chunk, u8>(&mut self.chunks)[..self.len]
    }
}

// ── Normalizer ───────────────────────────────────────────────────

/// Convert `width * height` tightly packed pixels in `format` into a new
/// canonical buffer.
///
/// Fails with [`TileError::FormatConversion`] when `data` is shorter than
/// the image, when an indexed image arrives without a palette, or when a
/// palette index is out of range. The input is never modified.
pub fn normalize(
    data: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
    palette: Option<&Palette>,
) -> Result<PixelBuffer, TileError> {
    let bpp = format.bytes_per_pixel();
    let sizes = (width as usize)
        .checked_mul(height as usize)
        .and_then(|count| Some((count.checked_mul(bpp)?, count.checked_mul(4)?)));
    let Some((needed, out_len)) = sizes else {
        return Err(TileError::FormatConversion(format!(
            "{width}x{height} {format:?} image size overflows"
        )));
    };
    if data.len() < needed {
        return Err(TileError::FormatConversion(format!(
            "{format:?} source holds {} bytes, {needed} required",
            data.len()
        )));
    }

    let palette = match format {
        PixelFormat::Indexed8 => Some(palette.ok_or_else(|| {
            TileError::FormatConversion("indexed source without a session palette".into())
        })?),
        _ => None,
    };

    let mut out = PixelBuffer::try_zeroed(out_len).map_err(|e| {
        TileError::FormatConversion(format!("{width}x{height} canonical buffer: {e}"))
    })?;
    let src = data[..needed].chunks_exact(bpp);
    let dst = out.as_bytes_mut().chunks_exact_mut(4);

    for (s, d) in src.zip(dst) {
        let [r, g, b] = match palette {
            Some(p) => p.lookup(s[0])?,
            None => format.decode_rgb(s),
        };
        d.copy_from_slice(&[b, g, r, 0xFF]);
    }

    Ok(out)
}

// ── Tests ────────────────────────────────────────────────────────
