use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::detection::domain::detection_source::DetectionSource;
use crate::detection::domain::raw_face::RawFace;
use crate::session::attendance_sink::AttendanceSink;
use crate::session::session_logger::SessionLogger;
use crate::session::session_runner::{RunConfig, RunSummary, SessionRunner};
use crate::session::tracking_session::{FrameResult, TrackingSession};

type SendError = Box<dyn std::error::Error + Send + Sync>;
type FrameMessage = Result<Vec<RawFace>, SendError>;

#[derive(Default)]
struct ReaderStats {
    read: usize,
    dropped: usize,
}

#[derive(Default)]
struct MainStats {
    processed: usize,
    rejected: usize,
    events: usize,
}

/// Runs a session with dedicated threads for the source and the sink.
///
/// Layout: `reader → main [match + track] → sink`
///
/// The reader hands frames over a bounded queue. When the session falls
/// behind a live source and dropping is enabled, the newest frames are
/// discarded rather than queued. Recorded sources always block instead. Results travel to the sink over a blocking queue, so no
/// event is ever lost.
pub struct ThreadedSessionRunner;

impl ThreadedSessionRunner {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ThreadedSessionRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRunner for ThreadedSessionRunner {
    fn run(
        &self,
        source: Box<dyn DetectionSource>,
        session: &mut TrackingSession,
        sink: Box<dyn AttendanceSink>,
        logger: &mut dyn SessionLogger,
        config: RunConfig,
    ) -> Result<RunSummary, Box<dyn std::error::Error>> {
        let cap = config.queue_capacity.max(1);
        let drop_when_busy = config.drop_frames_when_busy && source.is_live();
        if config.drop_frames_when_busy && !drop_when_busy {
            log::debug!("Recorded source: frames are queued, never dropped");
        }

        let (frame_tx, frame_rx) = crossbeam_channel::bounded::<FrameMessage>(cap);
        let (result_tx, result_rx) = crossbeam_channel::bounded::<FrameResult>(cap);

        let reader_handle = spawn_reader(
            source,
            frame_tx,
            config.cancelled.clone(),
            drop_when_busy,
        );
        let sink_handle = spawn_sink(sink, result_rx);

        let (stats, main_error) = run_main_loop(frame_rx, &result_tx, session, logger, &config);

        drop(result_tx);

        let reader_stats = join_threads(reader_handle, sink_handle, main_error)?;

        let summary = RunSummary {
            frames_read: reader_stats.read,
            frames_processed: stats.processed,
            frames_dropped: reader_stats.dropped,
            frames_rejected: stats.rejected,
            events_emitted: stats.events,
            present_ids: session.present_ids(),
        };
        logger.info(&format!(
            "Session finished: {} read, {} processed, {} dropped, {} rejected, {} events",
            summary.frames_read,
            summary.frames_processed,
            summary.frames_dropped,
            summary.frames_rejected,
            summary.events_emitted
        ));
        logger.summary();
        Ok(summary)
    }
}

fn spawn_reader(
    mut source: Box<dyn DetectionSource>,
    frame_tx: Sender<FrameMessage>,
    cancelled: Arc<AtomicBool>,
    drop_when_busy: bool,
) -> JoinHandle<ReaderStats> {
    std::thread::spawn(move || {
        let mut stats = ReaderStats::default();
        for frame_result in source.frames() {
            if cancelled.load(Ordering::Relaxed) {
                break;
            }
            stats.read += 1;
            let mapped = frame_result.map_err(|e| -> SendError { e.to_string().into() });
            if drop_when_busy {
                match frame_tx.try_send(mapped) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        stats.dropped += 1;
                        log::debug!("Session busy, dropped frame {}", stats.read);
                    }
                    Err(TrySendError::Disconnected(_)) => break,
                }
            } else if frame_tx.send(mapped).is_err() {
                break;
            }
        }
        source.close();
        stats
    })
}

fn spawn_sink(
    mut sink: Box<dyn AttendanceSink>,
    result_rx: Receiver<FrameResult>,
) -> JoinHandle<Result<(), SendError>> {
    std::thread::spawn(move || {
        let to_send = |e: Box<dyn std::error::Error>| -> SendError { e.to_string().into() };
        for result in result_rx {
            for event in &result.events {
                sink.record(event).map_err(to_send)?;
            }
            sink.publish_frame(&result).map_err(to_send)?;
        }
        sink.flush().map_err(to_send)
    })
}

/// Receives frames, runs them through the session, and forwards results
/// to the sink. Bad frames are logged and skipped without ticking.
fn run_main_loop(
    frame_rx: Receiver<FrameMessage>,
    result_tx: &Sender<FrameResult>,
    session: &mut TrackingSession,
    logger: &mut dyn SessionLogger,
    config: &RunConfig,
) -> (MainStats, Option<Box<dyn std::error::Error>>) {
    let mut stats = MainStats::default();

    for message in frame_rx.iter() {
        if config.cancelled.load(Ordering::Relaxed) {
            break;
        }
        logger.metric("queue_depth", frame_rx.len() as f64);

        let faces = match message {
            Ok(faces) => faces,
            Err(e) => {
                log::warn!("Skipping unreadable frame: {e}");
                stats.rejected += 1;
                continue;
            }
        };

        let started = Instant::now();
        let result = match session.process_frame(&faces) {
            Ok(result) => result,
            Err(e) => {
                log::warn!("Skipping frame with {} faces: {e}", faces.len());
                stats.rejected += 1;
                continue;
            }
        };
        logger.timing("track", started.elapsed().as_secs_f64() * 1000.0);
        logger.metric("faces_per_frame", faces.len() as f64);

        stats.events += result.events.len();
        if result_tx.send(result).is_err() {
            return (stats, Some("Sink channel closed unexpectedly".into()));
        }

        stats.processed += 1;
        logger.progress(stats.processed);

        if let Some(ref callback) = config.on_progress {
            if !callback(stats.processed) {
                log::info!("Session cancelled after {} frames", stats.processed);
                config.cancelled.store(true, Ordering::Relaxed);
                break;
            }
        }
    }

    (stats, None)
}

/// Joins both worker threads. A sink failure is reported in preference to
/// the main loop's view of it.
fn join_threads(
    reader_handle: JoinHandle<ReaderStats>,
    sink_handle: JoinHandle<Result<(), SendError>>,
    main_error: Option<Box<dyn std::error::Error>>,
) -> Result<ReaderStats, Box<dyn std::error::Error>> {
    let reader_stats = reader_handle
        .join()
        .map_err(|_| -> Box<dyn std::error::Error> { "Reader thread panicked".into() })?;

    match sink_handle.join() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(e.to_string().into()),
        Err(_) => return Err("Sink thread panicked".into()),
    }

    match main_error {
        Some(e) => Err(e),
        None => Ok(reader_stats),
    }
}
