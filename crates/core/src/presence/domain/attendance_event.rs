use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::person::PersonId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Entry,
    Exit,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Entry => "entry",
            EventType::Exit => "exit",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A committed entry or exit. Emitted once per transition, never retracted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttendanceEvent {
    pub person_id: PersonId,
    pub event_type: EventType,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
}
