use crate::detection::domain::raw_face::RawFace;

pub type FrameFaces = Result<Vec<RawFace>, Box<dyn std::error::Error>>;

/// Domain interface for the external face detector.
///
/// Yields one item per processed frame. A frame with no faces is an empty
/// list, not an error; errors mean the frame itself could not be obtained.
pub trait DetectionSource: Send {
    fn frames(&mut self) -> Box<dyn Iterator<Item = FrameFaces> + '_>;

    /// Whether frames arrive in real time. A live source keeps producing
    /// while the session is busy, so its frames may be dropped; a recorded
    /// source is always read to the end without loss.
    fn is_live(&self) -> bool {
        false
    }

    fn close(&mut self) {}
}
