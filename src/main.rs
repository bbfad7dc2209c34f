//! Command line player for PSG register-dump modules.
//!
//! Plays a module through the default audio device, or renders it to a WAV
//! file with `--export`. Imported asset records (`.mstr`) are accepted as
//! input too.

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;

use modstream::loader::RECORD_EXTENSION;
use modstream::streaming::share;
use modstream::{
    export_to_wav, import_file, load_imported, AudioDevice, ExportConfig, ImportOptions,
    PsgDumpEngine, StreamAsset, StreamConfig,
};

const STATUS_UPDATE_MS: u64 = 100;

#[derive(Parser, Debug)]
#[command(name = "modstream")]
#[command(about = "Play or export PSG register-dump chiptune modules")]
#[command(version)]
struct Args {
    /// Module file (.psgd) or imported asset record (.mstr)
    file: PathBuf,

    /// Start position in seconds
    #[arg(long, default_value_t = 0.0)]
    start: f64,

    /// Stop at the end of the sequence instead of looping
    #[arg(long)]
    no_loop: bool,

    /// Loop restart position in seconds
    #[arg(long)]
    loop_offset: Option<f64>,

    /// Render to a WAV file instead of playing
    #[arg(long, value_name = "OUT.wav")]
    export: Option<PathBuf>,

    /// Maximum export length in seconds
    #[arg(long)]
    max_seconds: Option<f64>,

    /// Output sample rate in Hz
    #[arg(long, default_value_t = modstream::constants::DEFAULT_SAMPLE_RATE)]
    sample_rate: u32,

    /// Save an asset record for the module and exit
    #[arg(long, value_name = "DEST")]
    import: Option<PathBuf>,
}

fn is_record(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == RECORD_EXTENSION)
}

fn load_asset(args: &Args) -> Result<StreamAsset<PsgDumpEngine>> {
    let asset = if is_record(&args.file) {
        let asset = load_imported::<PsgDumpEngine>(&args.file)
            .with_context(|| format!("Failed to load record '{}'", args.file.display()))?;
        if asset.sample_rate() != args.sample_rate {
            // Re-decode for the requested output rate, keeping the loop policy
            let settings = asset.loop_settings();
            let resampled = StreamAsset::<PsgDumpEngine>::load_with_sample_rate(
                asset.data(),
                args.sample_rate,
            )?;
            resampled.set_loop(settings.enabled);
            resampled.set_loop_offset(settings.offset_seconds);
            resampled
        } else {
            asset
        }
    } else {
        let data = std::fs::read(&args.file)
            .with_context(|| format!("Failed to read '{}'", args.file.display()))?;
        let asset = StreamAsset::<PsgDumpEngine>::load_with_sample_rate(&data, args.sample_rate)
            .with_context(|| format!("Failed to decode '{}'", args.file.display()))?;
        asset.set_loop(true);
        asset
    };

    if args.no_loop {
        asset.set_loop(false);
    }
    if let Some(offset) = args.loop_offset {
        asset.set_loop_offset(offset);
    }
    Ok(asset)
}

fn print_info(path: &Path, asset: &StreamAsset<PsgDumpEngine>) {
    let settings = asset.loop_settings();
    println!("File:        {}", path.display());
    println!("Length:      {:.2} s", asset.length_seconds());
    println!(
        "Tempo:       {:.1} bpm, {} beats ({}/bar)",
        asset.tempo_bpm(),
        asset.beat_count(),
        asset.beats_per_bar()
    );
    println!("Sample rate: {} Hz", asset.sample_rate());
    if settings.enabled {
        println!("Loop:        on (restart at {:.2} s)", settings.offset_seconds);
    } else {
        println!("Loop:        off");
    }
    println!();
}

fn run_export(asset: Arc<StreamAsset<PsgDumpEngine>>, args: &Args, out: &Path) -> Result<()> {
    let mut session = asset.create_session()?;
    let mut config = ExportConfig::new().start_at(args.start);
    if let Some(seconds) = args.max_seconds {
        config = config.max_seconds(seconds);
    }

    println!("Rendering to {}...", out.display());
    let summary = export_to_wav(&mut session, out, &config)
        .with_context(|| format!("Failed to export '{}'", out.display()))?;
    println!(
        "Wrote {:.2} s ({} frames), {} loop(s){}",
        summary.frames_written as f64 / asset.sample_rate() as f64,
        summary.frames_written,
        summary.loops,
        if summary.reached_end {
            ", reached end"
        } else {
            ""
        }
    );
    Ok(())
}

fn run_playback(asset: Arc<StreamAsset<PsgDumpEngine>>, args: &Args) -> Result<()> {
    let config = StreamConfig::low_latency(asset.sample_rate());
    let session = share(asset.create_session()?);
    let device = AudioDevice::new(Arc::clone(&session), &config)?;
    device.play(args.start)?;
    info!(latency_ms = config.latency_ms(), "playback started");

    println!("Playback running - keys: [p]=pause/resume, [q]=quit (then Enter)\n");

    let quit = Arc::new(AtomicBool::new(false));
    let (tx, rx) = std::sync::mpsc::channel::<u8>();
    {
        let quit = Arc::clone(&quit);
        std::thread::spawn(move || {
            let mut stdin = io::stdin();
            let mut buf = [0u8; 1];
            while !quit.load(Ordering::Relaxed) && stdin.read_exact(&mut buf).is_ok() {
                if tx.send(buf[0]).is_err() {
                    break;
                }
            }
        });
    }

    while !device.is_finished() {
        std::thread::sleep(Duration::from_millis(STATUS_UPDATE_MS));

        while let Ok(key) = rx.try_recv() {
            match key {
                b'p' | b'P' | b' ' => {
                    if device.is_paused() {
                        device.resume();
                    } else {
                        device.pause();
                    }
                }
                b'q' | b'Q' => quit.store(true, Ordering::Relaxed),
                _ => {}
            }
        }
        if quit.load(Ordering::Relaxed) {
            break;
        }

        let (position, loops) = {
            let guard = session.lock();
            (guard.playback_position(), guard.loop_count())
        };
        print!(
            "\x1B[2K\r[{:>7.2}s / {:.2}s] loops: {}{}",
            position,
            asset.length_seconds(),
            loops,
            if device.is_paused() { " (paused)" } else { "" }
        );
        io::stdout().flush().ok();
    }

    quit.store(true, Ordering::Relaxed);
    device.stop();
    println!("\n\nPlayback complete!");
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    if args.sample_rate == 0 {
        bail!("--sample-rate must be greater than zero");
    }

    if let Some(dest) = &args.import {
        let options = ImportOptions {
            loop_enabled: !args.no_loop,
            loop_offset_seconds: args.loop_offset.unwrap_or(0.0),
            sample_rate: args.sample_rate,
        };
        let record = import_file::<PsgDumpEngine>(&args.file, dest, &options)
            .with_context(|| format!("Failed to import '{}'", args.file.display()))?;
        println!(
            "Imported {:.2} s module to {}",
            record.length_seconds,
            modstream::loader::record_path(dest).display()
        );
        return Ok(());
    }

    let asset = Arc::new(load_asset(&args)?);
    print_info(&args.file, &asset);

    match &args.export {
        Some(out) => run_export(asset, &args, out),
        None => run_playback(asset, &args),
    }
}
