use crate::presence::domain::attendance_event::AttendanceEvent;
use crate::presence::domain::presence_ledger::PresenceLedger;
use crate::session::tracking_session::FrameResult;

/// Destination for committed attendance events.
///
/// Events arrive in commit order and are delivered exactly once. Frame
/// results are offered for live views; sinks that only care about events
/// can ignore them.
pub trait AttendanceSink: Send {
    fn record(&mut self, event: &AttendanceEvent) -> Result<(), Box<dyn std::error::Error>>;

    fn publish_frame(&mut self, _frame: &FrameResult) -> Result<(), Box<dyn std::error::Error>> {
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        Ok(())
    }
}

impl AttendanceSink for PresenceLedger {
    fn record(&mut self, event: &AttendanceEvent) -> Result<(), Box<dyn std::error::Error>> {
        self.apply(event);
        Ok(())
    }

    fn publish_frame(&mut self, frame: &FrameResult) -> Result<(), Box<dyn std::error::Error>> {
        for person_id in frame.faces.iter().filter_map(|f| f.person_id) {
            self.touch(person_id, frame.timestamp);
        }
        Ok(())
    }
}

/// Forwards everything to several sinks, in the order they were added.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Box<dyn AttendanceSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Box<dyn AttendanceSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn push(&mut self, sink: Box<dyn AttendanceSink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl AttendanceSink for FanoutSink {
    fn record(&mut self, event: &AttendanceEvent) -> Result<(), Box<dyn std::error::Error>> {
        for sink in &mut self.sinks {
            sink.record(event)?;
        }
        Ok(())
    }

    fn publish_frame(&mut self, frame: &FrameResult) -> Result<(), Box<dyn std::error::Error>> {
        for sink in &mut self.sinks {
            sink.publish_frame(frame)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        for sink in &mut self.sinks {
            sink.flush()?;
        }
        Ok(())
    }
}
