use std::io;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::Parser;

use attendance_core::detection::infrastructure::json_lines_source::JsonLinesDetectionSource;
use attendance_core::presence::domain::presence_ledger::PresenceLedger;
use attendance_core::presence::domain::presence_tracker::PresenceTracker;
use attendance_core::recognition::domain::roster::Roster;
use attendance_core::recognition::enrollment::Enrollment;
use attendance_core::recognition::infrastructure::gallery_file;
use attendance_core::recognition::infrastructure::gallery_matcher::GalleryMatcher;
use attendance_core::session::attendance_sink::{AttendanceSink, FanoutSink};
use attendance_core::session::infrastructure::json_lines_sink::JsonLinesSink;
use attendance_core::session::infrastructure::threaded_session_runner::ThreadedSessionRunner;
use attendance_core::session::session_logger::LogSessionLogger;
use attendance_core::session::session_runner::{RunConfig, SessionRunner};
use attendance_core::session::tracking_session::TrackingSession;
use attendance_core::shared::clock::{Clock, FixedClock, SystemClock};
use attendance_core::shared::settings::AttendanceSettings;

/// Turns recorded face detections into attendance entry and exit events.
#[derive(Parser)]
#[command(name = "attendance")]
struct Cli {
    /// Recorded detections: one JSON array of faces per line.
    input: PathBuf,

    /// Enrolled people (.bin/.gallery binary, otherwise JSON).
    #[arg(long)]
    gallery: Option<PathBuf>,

    /// Settings file (defaults to the user config directory).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Maximum encoding distance accepted as a match.
    #[arg(long)]
    tolerance: Option<f64>,

    /// Consecutive sightings before an entry is committed.
    #[arg(long)]
    entry_threshold: Option<u32>,

    /// Consecutive misses before an exit is committed.
    #[arg(long)]
    exit_threshold: Option<u32>,

    /// Frames buffered between the reader and the session.
    #[arg(long)]
    queue_capacity: Option<usize>,

    /// Treat the input as a live feed (e.g. a pipe from a running detector).
    /// Only live input may have frames dropped when the session is busy;
    /// recorded files are always replayed in full.
    #[arg(long)]
    live: bool,

    /// Never drop frames, even from live input.
    #[arg(long)]
    no_drop: bool,

    /// Write events here instead of stdout.
    #[arg(long)]
    events: Option<PathBuf>,

    /// Also write one annotated frame message per processed frame.
    #[arg(long)]
    frames: bool,

    /// Stamp every event with this RFC 3339 instant, for reproducible replays.
    #[arg(long)]
    fixed_clock: Option<String>,

    /// Write the loaded gallery to this path before running.
    #[arg(long)]
    export_gallery: Option<PathBuf>,

    /// Persist the effective settings to the user config directory.
    #[arg(long)]
    save_settings: bool,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let settings = resolve_settings(&cli)?;
    if cli.save_settings {
        settings.save()?;
        log::info!("Settings saved");
    }

    let enrollment = Enrollment::new(
        Arc::new(GalleryMatcher::new(settings.tolerance)),
        Arc::new(Roster::new()),
    );
    if let Some(ref path) = cli.gallery {
        enrollment.load(gallery_file::load(path)?);
    }
    if let Some(ref path) = cli.export_gallery {
        gallery_file::save(path, &enrollment.export())?;
        log::info!("Gallery written to {}", path.display());
    }

    let tracker = PresenceTracker::with_clock(
        settings.entry_threshold,
        settings.exit_threshold,
        build_clock(cli.fixed_clock.as_deref())?,
    );
    let mut session = TrackingSession::new(
        enrollment.matcher().clone(),
        enrollment.roster().clone(),
        tracker,
    );

    let ledger = PresenceLedger::new();
    let sink = FanoutSink::new()
        .with(build_event_sink(cli.events.as_deref(), enrollment.roster(), cli.frames)?)
        .with(Box::new(ledger.clone()));

    let source = JsonLinesDetectionSource::open(&cli.input)?.with_live(cli.live);
    let mut logger = LogSessionLogger::default();
    let summary = ThreadedSessionRunner::new().run(
        Box::new(source),
        &mut session,
        Box::new(sink),
        &mut logger,
        RunConfig::from_settings(&settings),
    )?;

    eprintln!(
        "{} frames read, {} processed, {} dropped, {} rejected, {} events",
        summary.frames_read,
        summary.frames_processed,
        summary.frames_dropped,
        summary.frames_rejected,
        summary.events_emitted
    );
    for row in ledger.current() {
        eprintln!(
            "Present: {} (since {}, last seen {})",
            enrollment.roster().display_name(row.person_id),
            row.entered_at.to_rfc3339(),
            row.last_seen.to_rfc3339()
        );
    }
    Ok(())
}

/// Settings file first, then command-line overrides.
fn resolve_settings(cli: &Cli) -> Result<AttendanceSettings, Box<dyn std::error::Error>> {
    let mut settings = match cli.settings {
        Some(ref path) => AttendanceSettings::load_from(path)?,
        None => AttendanceSettings::load()?,
    };
    if let Some(tolerance) = cli.tolerance {
        settings.tolerance = tolerance;
    }
    if let Some(entry) = cli.entry_threshold {
        settings.entry_threshold = entry;
    }
    if let Some(exit) = cli.exit_threshold {
        settings.exit_threshold = exit;
    }
    if let Some(capacity) = cli.queue_capacity {
        settings.frame_queue_capacity = capacity;
    }
    if cli.no_drop {
        settings.drop_frames_when_busy = false;
    }
    settings.validate()?;
    Ok(settings)
}

fn build_clock(fixed: Option<&str>) -> Result<Box<dyn Clock>, Box<dyn std::error::Error>> {
    match fixed {
        Some(text) => {
            let at = DateTime::parse_from_rfc3339(text)
                .map_err(|e| format!("Invalid --fixed-clock '{text}': {e}"))?;
            Ok(Box::new(FixedClock(at.with_timezone(&Utc))))
        }
        None => Ok(Box::new(SystemClock)),
    }
}

fn build_event_sink(
    path: Option<&Path>,
    roster: &Arc<Roster>,
    include_frames: bool,
) -> Result<Box<dyn AttendanceSink>, Box<dyn std::error::Error>> {
    match path {
        Some(path) => {
            let sink = JsonLinesSink::create(path, Arc::clone(roster))?.with_frames(include_frames);
            Ok(Box::new(sink))
        }
        None => {
            let sink = JsonLinesSink::new(io::stdout(), Arc::clone(roster)).with_frames(include_frames);
            Ok(Box::new(sink))
        }
    }
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !cli.input.exists() {
        return Err(format!("Input file not found: {}", cli.input.display()).into());
    }
    if let Some(ref gallery) = cli.gallery {
        if !gallery.exists() {
            return Err(format!("Gallery file not found: {}", gallery.display()).into());
        }
    }
    if cli.export_gallery.is_some() && cli.gallery.is_none() {
        return Err("--export-gallery requires --gallery".into());
    }
    if let Some(tolerance) = cli.tolerance {
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(format!("Tolerance must be a non-negative number, got {tolerance}").into());
        }
    }
    if cli.entry_threshold == Some(0) || cli.exit_threshold == Some(0) {
        return Err("Entry and exit thresholds must be at least 1".into());
    }
    Ok(())
}
