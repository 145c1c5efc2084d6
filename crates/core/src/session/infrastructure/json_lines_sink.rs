use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use crate::presence::domain::attendance_event::AttendanceEvent;
use crate::recognition::domain::roster::Roster;
use crate::session::attendance_sink::AttendanceSink;
use crate::session::messages::StreamMessage;
use crate::session::tracking_session::FrameResult;

/// Appends one `StreamMessage` per line.
///
/// Every attendance update is flushed as soon as it is written, so the
/// file is a durable record even if the process dies mid-run. Frame
/// messages are only written when enabled.
pub struct JsonLinesSink<W: Write + Send> {
    writer: W,
    roster: Arc<Roster>,
    include_frames: bool,
}

impl JsonLinesSink<BufWriter<File>> {
    pub fn create(path: &Path, roster: Arc<Roster>) -> Result<Self, Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(path)
            .map_err(|e| format!("Failed to create event log {}: {e}", path.display()))?;
        Ok(Self::new(BufWriter::new(file), roster))
    }
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W, roster: Arc<Roster>) -> Self {
        Self {
            writer,
            roster,
            include_frames: false,
        }
    }

    pub fn with_frames(mut self, include_frames: bool) -> Self {
        self.include_frames = include_frames;
        self
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_message(&mut self, message: &StreamMessage) -> Result<(), Box<dyn std::error::Error>> {
        serde_json::to_writer(&mut self.writer, message)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }
}

impl<W: Write + Send> AttendanceSink for JsonLinesSink<W> {
    fn record(&mut self, event: &AttendanceEvent) -> Result<(), Box<dyn std::error::Error>> {
        let message = StreamMessage::attendance_update(event, &self.roster);
        self.write_message(&message)?;
        self.writer.flush()?;
        Ok(())
    }

    fn publish_frame(&mut self, frame: &FrameResult) -> Result<(), Box<dyn std::error::Error>> {
        if self.include_frames {
            self.write_message(&StreamMessage::frame(frame))?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.writer.flush()?;
        Ok(())
    }
}
