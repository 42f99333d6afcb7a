//! # tix-bitmap
//!
//! Bitmap cache for TIX remote desktop sessions.
//!
//! The session delivers bitmaps as raw pixel rectangles and later asks
//! for them to be painted, often many times. This crate keeps each bitmap
//! as a tile, serves its first paint straight from the pixel buffer and
//! materializes it into an off-screen surface once it is reused, so later
//! paints are surface copies. Paints land on the active target, which the
//! session can redirect from the canvas to any bitmap's surface.
//!
//! This crate contains:
//! - **Bitmap**: `BitmapTile`, `PixelFormat` normalization, `PromotionPolicy`, `BitmapCache`
//! - **Display**: the `Display` collaborator trait and the RAM-backed `MemoryDisplay`
//! - **Command**: `BitmapCommand` and the never-failing `CommandDispatcher`
//! - **Config**: `CacheConfig`
//! - **Error**: `TileError`, a `thiserror`-based error enum

pub mod bitmap;
pub mod command;
pub mod config;
pub mod display;
pub mod error;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use bitmap::{
    BitmapCache, BitmapTile, CacheStats, Palette, PixelBuffer, PixelFormat, PromotionPolicy, Rect,
    ReuseThreshold, TileHandle,
};
pub use command::{BitmapCommand, BitmapId, CommandDispatcher};
pub use config::CacheConfig;
pub use display::{Display, MAX_SURFACE_DIMENSION, MemoryDisplay, Surface, SurfaceId, Target};
pub use error::TileError;
