//! Error types for the bitmap cache.
//!
//! Fallible operations return `Result<T, TileError>`. None of these errors
//! is fatal to a session: the cache degrades to "draw unpromoted" or
//! "draw nothing" and the command dispatcher logs instead of propagating.

use thiserror::Error;

/// The canonical error type for the bitmap cache.
#[derive(Debug, Error)]
pub enum TileError {
    // ── Tile Errors ──────────────────────────────────────────────
    /// A tile was created with a zero-sized dimension.
    #[error("invalid tile dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// Converting incoming pixel data to the canonical format failed.
    #[error("pixel format conversion failed: {0}")]
    FormatConversion(String),

    /// The handle does not refer to a live tile.
    #[error("unknown or destroyed tile handle")]
    UnknownTile,

    // ── Surface Errors ───────────────────────────────────────────
    /// The display could not provide an off-screen surface.
    #[error("surface allocation failed for {width}x{height}: {reason}")]
    SurfaceAllocation {
        width: u32,
        height: u32,
        reason: String,
    },

    /// The surface id is not (or no longer) owned by the display.
    #[error("unknown surface")]
    UnknownSurface,

    /// A blit source holds fewer bytes than the requested region needs.
    #[error("pixel buffer too short: {actual} bytes (need {needed})")]
    BufferTooShort { needed: usize, actual: usize },

    // ── Request Errors ───────────────────────────────────────────
    /// A protocol request was structurally invalid.
    #[error("malformed request: {0}")]
    MalformedRequest(&'static str),

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    Config(String),
}
