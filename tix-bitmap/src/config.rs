//! Bitmap cache tuning.

use serde::{Deserialize, Serialize};

use crate::error::TileError;

/// Settings for a [`BitmapCache`](crate::BitmapCache) session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Composites a tile must have served before it is promoted to a
    /// surface. The first composite is always drawn directly.
    pub promote_after: u32,
    /// Release a tile's pixel buffer once its surface exists.
    pub drop_pixels_on_promotion: bool,
    /// Cap on live off-screen surfaces for the in-memory display.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_surfaces: Option<usize>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            promote_after: 1,
            drop_pixels_on_promotion: false,
            max_surfaces: None,
        }
    }
}

impl CacheConfig {
    /// Reject settings that would break the cache's guarantees.
    pub fn validate(&self) -> Result<(), TileError> {
        if self.promote_after == 0 {
            return Err(TileError::Config(
                "promote_after must be at least 1 so first draws stay transient".into(),
            ));
        }
        Ok(())
    }
}
