//! Recording formats and the replay driver.
//!
//! A recording is a sequence of [`BitmapCommand`]s, either as JSON lines
//! (one command per line, `#` comments allowed) or as back-to-back
//! bincode records.

use std::io::{BufRead, Read, Write};

use thiserror::Error;
use tix_bitmap::{
    BitmapCache, BitmapCommand, CacheStats, CommandDispatcher, MemoryDisplay, Surface, TileError,
};
use tracing::{debug, info};

use crate::config::ReplayConfig;

// ── ReplayError ──────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON line could not be parsed.
    #[error("line {line}: {source}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("bincode error: {0}")]
    Bincode(#[from] Box<bincode::ErrorKind>),

    #[error("cache error: {0}")]
    Cache(#[from] TileError),
}

// ── RecordingFormat ──────────────────────────────────────────────

/// On-disk encoding of a recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RecordingFormat {
    /// One JSON command per line.
    Json,
    /// Concatenated bincode records.
    Bincode,
}

impl RecordingFormat {
    /// Guess the format from a file extension; JSON unless `.bin`.
    pub fn from_extension(path: &std::path::Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("bin") => RecordingFormat::Bincode,
            _ => RecordingFormat::Json,
        }
    }
}

/// Read a recording in the given format.
pub fn read_recording<R: BufRead>(
    reader: R,
    format: RecordingFormat,
) -> Result<Vec<BitmapCommand>, ReplayError> {
    match format {
        RecordingFormat::Json => read_json_lines(reader),
        RecordingFormat::Bincode => read_bincode(reader),
    }
}

/// Parse JSON lines, skipping blank lines and `#` comments.
pub fn read_json_lines<R: BufRead>(reader: R) -> Result<Vec<BitmapCommand>, ReplayError> {
    let mut commands = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let command = serde_json::from_str(trimmed).map_err(|source| ReplayError::Json {
            line: index + 1,
            source,
        })?;
        commands.push(command);
    }
    Ok(commands)
}

/// Decode bincode records until the input ends on a record boundary.
pub fn read_bincode<R: BufRead>(mut reader: R) -> Result<Vec<BitmapCommand>, ReplayError> {
    let mut commands = Vec::new();
    while !reader.fill_buf()?.is_empty() {
        commands.push(bincode::deserialize_from(&mut reader)?);
    }
    Ok(commands)
}

/// Encode commands as concatenated bincode records.
pub fn write_bincode<W: Write>(mut writer: W, commands: &[BitmapCommand]) -> Result<(), ReplayError> {
    for command in commands {
        bincode::serialize_into(&mut writer, command)?;
    }
    writer.flush()?;
    Ok(())
}

// ── Replay ───────────────────────────────────────────────────────

/// Outcome of a replay run.
#[derive(Debug, Clone)]
pub struct ReplaySummary {
    /// Commands applied.
    pub commands: usize,
    /// Commands the dispatcher dropped.
    pub rejected: u64,
    /// Tiles still alive when the recording ended.
    pub live_tiles: usize,
    pub stats: CacheStats,
    /// BLAKE3 digest of the final canvas bytes.
    pub canvas_digest: blake3::Hash,
    /// Final canvas contents.
    pub canvas: Surface,
}

/// Run `commands` against a fresh in-memory display.
pub fn replay(commands: Vec<BitmapCommand>, config: &ReplayConfig) -> Result<ReplaySummary, ReplayError> {
    let display = MemoryDisplay::try_new(config.canvas.width, config.canvas.height)?
        .with_max_surfaces(config.cache.max_surfaces);
    let cache = BitmapCache::with_config(display, &config.cache)?;
    let mut dispatcher = CommandDispatcher::new(cache);

    let count = commands.len();
    info!(
        "replaying {count} commands onto {}x{} canvas",
        config.canvas.width, config.canvas.height
    );

    for (index, command) in commands.into_iter().enumerate() {
        debug!(index, command = command.name(), "dispatch");
        dispatcher.dispatch(command);
    }

    let cache = dispatcher.cache();
    let canvas = cache.display().canvas().clone();
    Ok(ReplaySummary {
        commands: count,
        rejected: dispatcher.rejected(),
        live_tiles: cache.len(),
        stats: cache.stats().clone(),
        canvas_digest: blake3::hash(canvas.as_bytes()),
        canvas,
    })
}

/// Write a canvas as a binary PPM (P6) image.
pub fn write_ppm<W: Write>(mut writer: W, canvas: &Surface) -> Result<(), ReplayError> {
    write!(writer, "P6\n{} {}\n255\n", canvas.width(), canvas.height())?;
    let mut rgb = Vec::with_capacity(canvas.width() as usize * canvas.height() as usize * 3);
    for px in canvas.as_bytes().chunks_exact(4) {
        rgb.extend_from_slice(&[px[2], px[1], px[0]]);
    }
    writer.write_all(&rgb)?;
    writer.flush()?;
    Ok(())
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tix_bitmap::{PixelFormat, Rect};

    const SESSION: &str = r#"
# two paints of the same bitmap, second one cached
{"new":{"id":1,"width":2,"height":1,"format":"rgb24","data":[255,0,0,0,0,255]}}
{"paint":{"id":1,"bounds":{"left":0,"top":0,"right":1,"bottom":0},"dest_x":0,"dest_y":0}}
{"paint":{"id":1,"bounds":{"left":0,"top":0,"right":1,"bottom":0},"dest_x":0,"dest_y":1}}
{"set_surface":{"primary":false,"id":null}}
"#;

    fn small_config() -> ReplayConfig {
        let mut cfg = ReplayConfig::default();
        cfg.canvas.width = 4;
        cfg.canvas.height = 2;
        cfg
    }

    #[test]
    fn json_lines_skip_comments() {
        let commands = read_json_lines(Cursor::new(SESSION)).unwrap();
        assert_eq!(commands.len(), 4);
        assert_eq!(commands[0].name(), "new");
    }

    #[test]
    fn json_error_reports_line() {
        let err = read_json_lines(Cursor::new("\n{\"free\":{}}\n")).unwrap_err();
        assert!(matches!(err, ReplayError::Json { line: 2, .. }));
    }

    #[test]
    fn bincode_stream_matches_json() {
        let commands = read_json_lines(Cursor::new(SESSION)).unwrap();
        let mut encoded = Vec::new();
        write_bincode(&mut encoded, &commands).unwrap();

        let decoded = read_recording(Cursor::new(encoded), RecordingFormat::Bincode).unwrap();
        assert_eq!(decoded, commands);
    }

    #[test]
    fn truncated_bincode_fails() {
        let commands = vec![BitmapCommand::Paint {
            id: 1,
            bounds: Rect::from_size(2, 2),
            dest_x: 0,
            dest_y: 0,
        }];
        let mut encoded = Vec::new();
        write_bincode(&mut encoded, &commands).unwrap();
        encoded.pop();

        assert!(read_bincode(Cursor::new(encoded)).is_err());
    }

    #[test]
    fn replay_reports_stats_and_digest() {
        let commands = read_json_lines(Cursor::new(SESSION)).unwrap();
        let summary = replay(commands.clone(), &small_config()).unwrap();

        assert_eq!(summary.commands, 4);
        assert_eq!(summary.rejected, 0);
        assert_eq!(summary.live_tiles, 1);
        assert_eq!(summary.stats.direct_draws, 1);
        assert_eq!(summary.stats.cached_draws, 1);
        assert_eq!(summary.canvas.pixel(1, 1), Some([0xFF, 0, 0, 0xFF]));

        // Same input, same canvas.
        let again = replay(commands, &small_config()).unwrap();
        assert_eq!(again.canvas_digest, summary.canvas_digest);
    }

    #[test]
    fn invalid_cache_config_is_an_error() {
        let mut cfg = small_config();
        cfg.cache.promote_after = 0;
        let err = replay(Vec::new(), &cfg).unwrap_err();
        assert!(matches!(err, ReplayError::Cache(TileError::Config(_))));
    }

    #[test]
    fn oversized_canvas_is_an_error() {
        let mut cfg = small_config();
        cfg.canvas.width = u32::MAX;
        let err = replay(Vec::new(), &cfg).unwrap_err();
        assert!(matches!(
            err,
            ReplayError::Cache(TileError::SurfaceAllocation { .. })
        ));
    }

    #[test]
    fn ppm_output_is_rgb() {
        let commands = vec![
            BitmapCommand::New {
                id: 1,
                width: 1,
                height: 1,
                format: PixelFormat::Rgb24,
                data: Some(vec![10, 20, 30]),
            },
            BitmapCommand::Paint {
                id: 1,
                bounds: Rect::from_size(1, 1),
                dest_x: 0,
                dest_y: 0,
            },
        ];
        let summary = replay(commands, &small_config()).unwrap();

        let mut out = Vec::new();
        write_ppm(&mut out, &summary.canvas).unwrap();
        let header = b"P6\n4 2\n255\n";
        assert_eq!(&out[..header.len()], header);
        assert_eq!(&out[header.len()..header.len() + 3], &[10, 20, 30]);
        assert_eq!(out.len(), header.len() + 4 * 2 * 3);
    }
}
