use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::presence::domain::attendance_event::{AttendanceEvent, EventType};
use crate::shared::person::PersonId;

/// One row of the "who is in the room" view.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CurrentPresence {
    pub person_id: PersonId,
    pub entered_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// Current-presence table maintained from the event stream.
///
/// An entry inserts (or refreshes) a row, an exit deletes it. Clones share
/// the same table, so one clone can be handed to a sink while another
/// answers queries.
#[derive(Clone, Debug, Default)]
pub struct PresenceLedger {
    rows: Arc<Mutex<BTreeMap<PersonId, CurrentPresence>>>,
}

impl PresenceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&self, event: &AttendanceEvent) {
        let mut rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
        match event.event_type {
            EventType::Entry => {
                rows.insert(
                    event.person_id,
                    CurrentPresence {
                        person_id: event.person_id,
                        entered_at: event.timestamp,
                        last_seen: event.timestamp,
                    },
                );
            }
            EventType::Exit => {
                rows.remove(&event.person_id);
            }
        }
    }

    /// Refreshes `last_seen` for people already present.
    pub fn touch(&self, person_id: PersonId, at: DateTime<Utc>) {
        let mut rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(row) = rows.get_mut(&person_id) {
            row.last_seen = at;
        }
    }

    pub fn current(&self) -> Vec<CurrentPresence> {
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    pub fn is_present(&self, person_id: PersonId) -> bool {
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&person_id)
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
