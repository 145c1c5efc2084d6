use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::detection::domain::raw_face::RawFace;
use crate::presence::domain::attendance_event::AttendanceEvent;
use crate::presence::domain::detection::Detection;
use crate::presence::domain::presence_state::PresenceState;
use crate::presence::domain::presence_tracker::PresenceTracker;
use crate::recognition::domain::face_matcher::FaceMatcher;
use crate::recognition::domain::roster::Roster;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::face_encoding::EncodingError;
use crate::shared::person::PersonId;

pub const UNKNOWN_NAME: &str = "Unknown";

/// Status shown next to a face in a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaceStatus {
    Absent,
    Entering,
    Present,
    Exiting,
    Unknown,
}

impl From<PresenceState> for FaceStatus {
    fn from(state: PresenceState) -> Self {
        match state {
            PresenceState::Absent => FaceStatus::Absent,
            PresenceState::Entering => FaceStatus::Entering,
            PresenceState::Present => FaceStatus::Present,
            PresenceState::Exiting => FaceStatus::Exiting,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedFace {
    pub person_id: Option<PersonId>,
    pub name: String,
    pub confidence: f64,
    pub bbox: BoundingBox,
    pub status: FaceStatus,
}

/// Everything one processed frame produced.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameResult {
    pub frame_index: u64,
    pub timestamp: DateTime<Utc>,
    pub faces: Vec<AnnotatedFace>,
    pub events: Vec<AttendanceEvent>,
}

/// One camera's worth of attendance tracking.
///
/// Each processed frame resolves every face against one gallery snapshot,
/// annotates it, and then ticks the presence tracker exactly once. A frame
/// whose faces cannot be matched is rejected whole and does not tick.
pub struct TrackingSession {
    matcher: Arc<dyn FaceMatcher>,
    roster: Arc<Roster>,
    tracker: PresenceTracker,
    frame_index: u64,
}

impl TrackingSession {
    pub fn new(matcher: Arc<dyn FaceMatcher>, roster: Arc<Roster>, tracker: PresenceTracker) -> Self {
        Self {
            matcher,
            roster,
            tracker,
            frame_index: 0,
        }
    }

    pub fn process_frame(&mut self, faces: &[RawFace]) -> Result<FrameResult, EncodingError> {
        let encodings: Vec<&[f64]> = faces.iter().map(|f| f.encoding.as_slice()).collect();
        let matches = self.matcher.match_frame(&encodings)?;

        // Status is taken before the tick, so a face reads "entering" on
        // the frame that commits its entry.
        let annotated: Vec<AnnotatedFace> = faces
            .iter()
            .zip(&matches)
            .map(|(face, m)| self.annotate(face.bbox, m.person_id, m.confidence))
            .collect();

        let detections: Vec<Detection> = faces
            .iter()
            .zip(matches)
            .map(|(face, m)| Detection::from_match(m, face.bbox))
            .collect();
        let events = self.tracker.update(&detections);
        let timestamp = self.tracker.last_tick().unwrap_or_else(Utc::now);

        let result = FrameResult {
            frame_index: self.frame_index,
            timestamp,
            faces: annotated,
            events,
        };
        self.frame_index += 1;
        Ok(result)
    }

    fn annotate(&self, bbox: BoundingBox, person_id: Option<PersonId>, confidence: f64) -> AnnotatedFace {
        match person_id {
            Some(id) => AnnotatedFace {
                person_id,
                name: self.roster.display_name(id),
                confidence,
                bbox,
                status: self.tracker.state_of(id).into(),
            },
            None => AnnotatedFace {
                person_id: None,
                name: UNKNOWN_NAME.to_string(),
                confidence,
                bbox,
                status: FaceStatus::Unknown,
            },
        }
    }

    pub fn reset(&mut self) {
        self.tracker.reset();
        self.frame_index = 0;
        log::debug!("Session reset");
    }

    pub fn present_ids(&self) -> BTreeSet<PersonId> {
        self.tracker.present_ids()
    }

    pub fn tracker(&self) -> &PresenceTracker {
        &self.tracker
    }

    pub fn roster(&self) -> &Arc<Roster> {
        &self.roster
    }

    /// Number of frames processed since creation or the last reset.
    pub fn frames_processed(&self) -> u64 {
        self.frame_index
    }
}
