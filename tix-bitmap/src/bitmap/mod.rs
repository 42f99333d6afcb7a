//! Bitmap tiles and the cache that decides when to materialize them.
//!
//! ## Sub-modules
//!
//! | Module   | Purpose                                              |
//! |----------|------------------------------------------------------|
//! | `format` | Pixel formats, palette, aligned buffers, normalizer  |
//! | `tile`   | `BitmapTile` state and paint bounds                  |
//! | `policy` | When and how a tile is promoted to a surface         |
//! | `cache`  | `BitmapCache`: tile lifecycle, compositing, targets  |

pub mod cache;
pub mod format;
pub mod policy;
pub mod tile;

// ── Re-exports ───────────────────────────────────────────────────

pub use cache::{BitmapCache, CacheStats, TileHandle};
pub use format::{Palette, PixelBuffer, PixelFormat, normalize};
pub use policy::{PromotionPolicy, ReuseThreshold, maybe_promote, promote};
pub use tile::{BitmapTile, Rect};
