use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::shared::person::{fallback_name, PersonId};

/// Display names of enrolled people, shared between enrollment and
/// running sessions.
#[derive(Debug, Default)]
pub struct Roster {
    names: RwLock<HashMap<PersonId, String>>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, person_id: PersonId, name: impl Into<String>) {
        self.names
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(person_id, name.into());
    }

    pub fn remove(&self, person_id: PersonId) -> Option<String> {
        self.names
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&person_id)
    }

    pub fn replace(&self, names: HashMap<PersonId, String>) {
        *self.names.write().unwrap_or_else(PoisonError::into_inner) = names;
    }

    pub fn name(&self, person_id: PersonId) -> Option<String> {
        self.names
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&person_id)
            .cloned()
    }

    /// Enrolled name, or `"ID: <id>"` when none is known.
    pub fn display_name(&self, person_id: PersonId) -> String {
        self.name(person_id)
            .unwrap_or_else(|| fallback_name(person_id))
    }

    pub fn len(&self) -> usize {
        self.names.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
