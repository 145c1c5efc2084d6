use std::collections::BTreeSet;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::detection::domain::detection_source::DetectionSource;
use crate::session::attendance_sink::AttendanceSink;
use crate::session::session_logger::SessionLogger;
use crate::session::tracking_session::TrackingSession;
use crate::shared::constants::DEFAULT_FRAME_QUEUE_CAPACITY;
use crate::shared::person::PersonId;
use crate::shared::settings::AttendanceSettings;

/// Configuration for one session run.
pub struct RunConfig {
    pub queue_capacity: usize,
    /// Drop incoming frames instead of blocking the source when the
    /// session falls behind.
    pub drop_frames_when_busy: bool,
    /// Called with the number of processed frames; returning `false`
    /// stops the run.
    pub on_progress: Option<Box<dyn Fn(usize) -> bool + Send>>,
    pub cancelled: Arc<AtomicBool>,
}

impl RunConfig {
    pub fn from_settings(settings: &AttendanceSettings) -> Self {
        Self {
            queue_capacity: settings.frame_queue_capacity,
            drop_frames_when_busy: settings.drop_frames_when_busy,
            ..Self::default()
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_FRAME_QUEUE_CAPACITY,
            drop_frames_when_busy: true,
            on_progress: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// Counters for a finished run.
///
/// Unless the run was cancelled, every frame read is exactly one of
/// processed, dropped or rejected.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunSummary {
    pub frames_read: usize,
    pub frames_processed: usize,
    pub frames_dropped: usize,
    pub frames_rejected: usize,
    pub events_emitted: usize,
    pub present_ids: BTreeSet<PersonId>,
}

/// Drives a tracking session from a detection source into a sink.
///
/// This is a port; infrastructure decides how the stages are scheduled.
pub trait SessionRunner: Send {
    fn run(
        &self,
        source: Box<dyn DetectionSource>,
        session: &mut TrackingSession,
        sink: Box<dyn AttendanceSink>,
        logger: &mut dyn SessionLogger,
        config: RunConfig,
    ) -> Result<RunSummary, Box<dyn std::error::Error>>;
}
