//! TIX bitmap replay: entry point.
//!
//! ```text
//! tix-bitmap-replay <recording>                  Replay a JSON-lines recording
//! tix-bitmap-replay <recording> --dump out.ppm   Also write the final canvas
//! tix-bitmap-replay <recording> --to-bincode r.bin   Re-encode the recording
//! tix-bitmap-replay --gen-config                 Dump default config and exit
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;
use std::sync::Mutex;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tix_bitmap_replay::config::ReplayConfig;
use tix_bitmap_replay::replay::{self, RecordingFormat};

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "tix-bitmap-replay", about = "Replay recorded TIX bitmap commands")]
struct Cli {
    /// Recording to replay.
    #[arg(required_unless_present = "gen_config")]
    recording: Option<PathBuf>,

    /// Recording encoding (defaults from the file extension).
    #[arg(short, long, value_enum)]
    format: Option<RecordingFormat>,

    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "tix-bitmap-replay.toml")]
    config: PathBuf,

    /// Write the final canvas as a PPM image.
    #[arg(long)]
    dump: Option<PathBuf>,

    /// Re-encode the recording as bincode and exit.
    #[arg(long)]
    to_bincode: Option<PathBuf>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&ReplayConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let config = ReplayConfig::load(&cli.config);

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    if config.logging.file.is_empty() {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    } else {
        let file = File::create(&config.logging.file)?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    }

    info!("tix-bitmap-replay v{}", env!("CARGO_PKG_VERSION"));

    // ── 1. Load the recording ───────────────────────────────────

    let path = cli.recording.ok_or("no recording given")?;
    let format = cli
        .format
        .unwrap_or_else(|| RecordingFormat::from_extension(&path));
    let reader = BufReader::new(File::open(&path)?);
    let commands = replay::read_recording(reader, format)?;
    info!("loaded {} commands from {}", commands.len(), path.display());

    if let Some(out) = cli.to_bincode {
        replay::write_bincode(BufWriter::new(File::create(&out)?), &commands)?;
        info!("wrote bincode recording to {}", out.display());
        return Ok(());
    }

    // ── 2. Replay ───────────────────────────────────────────────

    let summary = replay::replay(commands, &config)?;
    if summary.rejected > 0 {
        warn!("{} commands were dropped", summary.rejected);
    }

    let stats = &summary.stats;
    println!("commands:           {}", summary.commands);
    println!("rejected:           {}", summary.rejected);
    println!("tiles created:      {}", stats.tiles_created);
    println!("tiles destroyed:    {}", stats.tiles_destroyed);
    println!("tiles live at end:  {}", summary.live_tiles);
    println!("conversions failed: {}", stats.conversions_failed);
    println!("promotions:         {}", stats.promotions);
    println!("failed promotions:  {}", stats.failed_promotions);
    println!("cached draws:       {}", stats.cached_draws);
    println!("direct draws:       {}", stats.direct_draws);
    println!("empty draws:        {}", stats.empty_draws);
    println!("canvas blake3:      {}", summary.canvas_digest);

    // ── 3. Optional canvas dump ─────────────────────────────────

    if let Some(out) = cli.dump {
        replay::write_ppm(BufWriter::new(File::create(&out)?), &summary.canvas)?;
        info!("canvas written to {}", out.display());
    }

    Ok(())
}
