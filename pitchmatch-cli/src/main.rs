//! # pitchmatch - headless pitch-matching listener
//!
//! Listens to the microphone (or replays a WAV file), runs the pitch
//! detection pipeline once per capture cycle and prints the detected note.
//!
//! ## Architecture
//! - **Main Thread**: argument parsing and report printing
//! - **Listen Thread**: capture, analysis and classification cycles
//! - **Communication**: Crossbeam channels for reports and shutdown

mod telemetry;
mod worker;

use anyhow::{Context, Result, bail};
use clap::{Arg, ArgAction, ArgMatches, Command};
use pitchmatch_core::{
    ListenerConfig, MicrophoneSource, NoteTable, ReplaySource, tuning, wav,
};
use std::path::PathBuf;
use tracing::info;
use worker::{CycleReport, ListenWorker};

fn cli() -> Command {
    Command::new("pitchmatch")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Detect sung notes from the microphone or a WAV file")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("JSON listener configuration"),
        )
        .arg(
            Arg::new("notes")
                .short('n')
                .long("notes")
                .value_name("FILE")
                .help("JSON note table (defaults to the chromatic table)"),
        )
        .arg(
            Arg::new("input")
                .short('i')
                .long("input")
                .value_name("FILE")
                .help("Replay a 16-bit PCM WAV file instead of the microphone"),
        )
        .arg(
            Arg::new("rate")
                .short('r')
                .long("rate")
                .value_name("HZ")
                .value_parser(clap::value_parser!(u32))
                .help("Sample rate in Hz (default: 44100)"),
        )
        .arg(
            Arg::new("chunk")
                .long("chunk")
                .value_name("SAMPLES")
                .value_parser(clap::value_parser!(usize))
                .help("Samples per device read (default: 1024)"),
        )
        .arg(
            Arg::new("duration")
                .short('d')
                .long("duration")
                .value_name("SECONDS")
                .value_parser(clap::value_parser!(f64))
                .help("Buffer length per cycle in seconds (default: 0.1)"),
        )
        .arg(
            Arg::new("persist")
                .long("persist-buffer")
                .value_name("FILE")
                .help("Round-trip every captured buffer through this WAV file"),
        )
        .arg(
            Arg::new("cycles")
                .long("cycles")
                .value_name("COUNT")
                .value_parser(clap::value_parser!(u64))
                .help("Stop after this many cycles"),
        )
        .arg(
            Arg::new("until")
                .long("until")
                .value_name("LABEL")
                .help("Stop once this note label is detected"),
        )
        .arg(
            Arg::new("frequencies")
                .long("frequencies")
                .action(ArgAction::SetTrue)
                .help("Also print each cycle's dominant frequency set"),
        )
}

/// Builds the listener configuration: file first, then command-line overrides.
fn load_config(matches: &ArgMatches) -> Result<ListenerConfig> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => ListenerConfig::load(path)
            .with_context(|| format!("failed to load configuration from {path}"))?,
        None => ListenerConfig::default(),
    };

    if let Some(&rate) = matches.get_one::<u32>("rate") {
        config.sample_rate = rate;
    }
    if let Some(&chunk) = matches.get_one::<usize>("chunk") {
        config.chunk_size = chunk;
    }
    if let Some(&duration) = matches.get_one::<f64>("duration") {
        config.buffer_seconds = duration;
    }
    if let Some(path) = matches.get_one::<String>("persist") {
        config.persist_buffer = Some(PathBuf::from(path));
    }

    config.validate().context("invalid listener configuration")?;
    Ok(config)
}

fn load_notes(matches: &ArgMatches) -> Result<NoteTable> {
    match matches.get_one::<String>("notes") {
        Some(path) => NoteTable::load(path)
            .with_context(|| format!("failed to load note table from {path}")),
        None => Ok(NoteTable::chromatic()),
    }
}

fn describe_frequencies(frequencies: &[f64]) -> String {
    frequencies
        .iter()
        .map(|&f| {
            if f == tuning::REST_MARKER {
                format!("{f}")
            } else {
                // Estimates are halved, so the sung pitch sits an octave up.
                format!("{f} (~{})", tuning::nearest_key(f * 2.0).name)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn main() -> Result<()> {
    telemetry::init();
    let matches = cli().get_matches();

    let mut config = load_config(&matches)?;
    let table = load_notes(&matches)?;
    let max_cycles = matches.get_one::<u64>("cycles").copied();
    let until = matches.get_one::<String>("until").cloned();
    let show_frequencies = matches.get_flag("frequencies");

    info!("[MAIN] Note table with {} entries", table.len());

    let (mut worker, reports) = match matches.get_one::<String>("input") {
        Some(path) => {
            let buffer = wav::read_buffer(path)
                .with_context(|| format!("failed to read WAV file {path}"))?;
            info!(
                "[MAIN] Replaying {} ({:.2}s at {} Hz)",
                path,
                buffer.duration(),
                buffer.sample_rate()
            );
            config.sample_rate = buffer.sample_rate();
            config.validate().context("WAV file cannot be analysed")?;
            ListenWorker::start(
                move || Ok(ReplaySource::new(buffer.clone())),
                config,
                table,
                max_cycles,
            )
        }
        None => {
            let rate = config.sample_rate;
            ListenWorker::start(move || MicrophoneSource::open(rate), config, table, max_cycles)
        }
    };

    for report in reports.iter() {
        match report {
            CycleReport::Detected { cycle, outcome } => {
                println!("{cycle:>5}  {}", outcome.detection);
                if show_frequencies {
                    println!("       {}", describe_frequencies(outcome.frequencies.as_slice()));
                }
                if until.as_deref() == Some(outcome.detection.label()) {
                    info!("[MAIN] Detected {}, stopping", outcome.detection);
                    worker.shutdown();
                    return Ok(());
                }
            }
            CycleReport::Missed { cycle, reason } => {
                println!("{cycle:>5}  -  ({reason})");
            }
            CycleReport::Failed { reason } => {
                worker.join();
                bail!("listening stopped: {reason}");
            }
        }
    }

    worker.join();
    Ok(())
}
