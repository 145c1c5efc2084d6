use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::presence::domain::attendance_event::{AttendanceEvent, EventType};
use crate::recognition::domain::roster::Roster;
use crate::session::tracking_session::{AnnotatedFace, FrameResult};
use crate::shared::person::PersonId;

/// Payloads pushed to live viewers, tagged by `type`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamMessage {
    Frame {
        faces: Vec<AnnotatedFace>,
        timestamp: DateTime<Utc>,
    },
    AttendanceUpdate {
        event: EventType,
        person_id: PersonId,
        name: String,
        confidence: f64,
        timestamp: DateTime<Utc>,
    },
    Error {
        message: String,
    },
}

impl StreamMessage {
    pub fn frame(result: &FrameResult) -> Self {
        StreamMessage::Frame {
            faces: result.faces.clone(),
            timestamp: result.timestamp,
        }
    }

    pub fn attendance_update(event: &AttendanceEvent, roster: &Roster) -> Self {
        StreamMessage::AttendanceUpdate {
            event: event.event_type,
            person_id: event.person_id,
            name: roster.display_name(event.person_id),
            confidence: event.confidence,
            timestamp: event.timestamp,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        StreamMessage::Error {
            message: message.into(),
        }
    }
}
