//! # tix-bitmap-replay: Bitmap Command Replay
//!
//! Feeds a recorded stream of bitmap commands through the TIX bitmap
//! cache on an in-memory display, then reports cache statistics and a
//! digest of the final canvas. Useful for checking that cache changes do
//! not alter what a session renders.

pub mod config;
pub mod replay;
