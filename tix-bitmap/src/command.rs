//! Bitmap commands as issued by the remote-desktop protocol layer.
//!
//! The protocol refers to bitmaps by its own numeric ids. The
//! [`CommandDispatcher`] maps those ids onto [`TileHandle`]s and drives a
//! [`BitmapCache`]. Dispatch never fails: a bad command is logged and
//! dropped so one malformed request cannot end the session.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::bitmap::cache::{BitmapCache, TileHandle};
use crate::bitmap::format::{Palette, PixelFormat};
use crate::bitmap::policy::{PromotionPolicy, ReuseThreshold};
use crate::bitmap::tile::Rect;
use crate::display::Display;
use crate::error::TileError;

/// Protocol-level bitmap id.
pub type BitmapId = u32;

// ── BitmapCommand ────────────────────────────────────────────────

/// One bitmap operation from the session's command stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BitmapCommand {
    /// Create a bitmap.
    New {
        id: BitmapId,
        width: u32,
        height: u32,
        format: PixelFormat,
        data: Option<Vec<u8>>,
    },
    /// Composite a bitmap onto the active target.
    Paint {
        id: BitmapId,
        bounds: Rect,
        dest_x: u32,
        dest_y: u32,
    },
    /// Redirect drawing to the canvas (`primary`) or to a bitmap.
    SetSurface { primary: bool, id: Option<BitmapId> },
    /// Release a bitmap.
    Free { id: BitmapId },
    /// Replace the palette used for indexed bitmaps.
    Palette { entries: Vec<[u8; 3]> },
}

impl BitmapCommand {
    /// Short name for log lines.
    pub fn name(&self) -> &'static str {
        match self {
            BitmapCommand::New { .. } => "new",
            BitmapCommand::Paint { .. } => "paint",
            BitmapCommand::SetSurface { .. } => "set_surface",
            BitmapCommand::Free { .. } => "free",
            BitmapCommand::Palette { .. } => "palette",
        }
    }
}

// ── CommandDispatcher ────────────────────────────────────────────

/// Applies [`BitmapCommand`]s to a [`BitmapCache`].
pub struct CommandDispatcher<D: Display, P: PromotionPolicy = ReuseThreshold> {
    cache: BitmapCache<D, P>,
    handles: HashMap<BitmapId, TileHandle>,
    rejected: u64,
}

impl<D: Display, P: PromotionPolicy> CommandDispatcher<D, P> {
    pub fn new(cache: BitmapCache<D, P>) -> Self {
        Self {
            cache,
            handles: HashMap::new(),
            rejected: 0,
        }
    }

    pub fn cache(&self) -> &BitmapCache<D, P> {
        &self.cache
    }

    /// Handle currently bound to a protocol id.
    pub fn handle(&self, id: BitmapId) -> Option<TileHandle> {
        self.handles.get(&id).copied()
    }

    /// Commands that failed and were dropped.
    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    /// Apply one command, logging instead of propagating failures.
    pub fn dispatch(&mut self, command: BitmapCommand) {
        let name = command.name();
        if let Err(e) = self.apply(command) {
            self.rejected += 1;
            warn!("{name} command dropped: {e}");
        }
    }

    /// Apply a sequence of commands in order.
    pub fn dispatch_all<I>(&mut self, commands: I)
    where
        I: IntoIterator<Item = BitmapCommand>,
    {
        for command in commands {
            self.dispatch(command);
        }
    }

    fn apply(&mut self, command: BitmapCommand) -> Result<(), TileError> {
        match command {
            BitmapCommand::New {
                id,
                width,
                height,
                format,
                data,
            } => {
                let handle = self.cache.create_tile(width, height, data, format)?;
                if let Some(previous) = self.handles.insert(id, handle) {
                    debug!(id, "bitmap id reused; releasing previous tile");
                    self.cache.destroy_tile(previous);
                }
                Ok(())
            }
            BitmapCommand::Paint {
                id,
                bounds,
                dest_x,
                dest_y,
            } => {
                let handle = self.handles.get(&id).copied().ok_or(TileError::UnknownTile)?;
                self.cache.composite_tile(handle, bounds, dest_x, dest_y)
            }
            BitmapCommand::SetSurface { primary, id } => {
                // An unknown id is the same malformed request as a null one.
                let handle = id.and_then(|id| self.handles.get(&id).copied());
                self.cache.select_target(primary, handle)
            }
            BitmapCommand::Free { id } => {
                match self.handles.remove(&id) {
                    Some(handle) => self.cache.destroy_tile(handle),
                    None => debug!(id, "free of unknown bitmap ignored"),
                }
                Ok(())
            }
            BitmapCommand::Palette { entries } => {
                self.cache.set_palette(Palette::new(entries)?);
                Ok(())
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
