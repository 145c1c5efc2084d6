use std::collections::HashMap;
use std::sync::Arc;

use crate::recognition::domain::gallery::Gallery;
use crate::recognition::domain::roster::Roster;
use crate::recognition::infrastructure::gallery_file::EnrolledFace;
use crate::recognition::infrastructure::gallery_matcher::GalleryMatcher;
use crate::shared::face_encoding::FaceEncoding;
use crate::shared::person::PersonId;

/// Keeps the matcher gallery and the name roster in step when people are
/// enrolled or removed while sessions are running.
#[derive(Clone)]
pub struct Enrollment {
    matcher: Arc<GalleryMatcher>,
    roster: Arc<Roster>,
}

impl Enrollment {
    pub fn new(matcher: Arc<GalleryMatcher>, roster: Arc<Roster>) -> Self {
        Self { matcher, roster }
    }

    pub fn matcher(&self) -> &Arc<GalleryMatcher> {
        &self.matcher
    }

    pub fn roster(&self) -> &Arc<Roster> {
        &self.roster
    }

    pub fn enroll(&self, person_id: PersonId, name: impl Into<String>, encoding: FaceEncoding) {
        let name = name.into();
        log::info!("Enrolling person {person_id} ({name})");
        self.matcher.add(person_id, encoding);
        self.roster.insert(person_id, name);
    }

    pub fn remove(&self, person_id: PersonId) -> bool {
        let removed = self.matcher.remove(person_id);
        self.roster.remove(person_id);
        if removed {
            log::info!("Removed person {person_id}");
        }
        removed
    }

    /// Replaces every enrollment at once.
    pub fn load(&self, faces: Vec<EnrolledFace>) {
        let count = faces.len();
        let mut names = HashMap::with_capacity(count);
        let mut entries = Vec::with_capacity(count);
        for face in faces {
            if !face.name.is_empty() {
                names.insert(face.person_id, face.name);
            }
            entries.push((face.person_id, face.encoding));
        }
        self.matcher.replace(Gallery::from_entries(entries));
        self.roster.replace(names);
        log::info!("Loaded {count} enrolled people");
    }

    /// Current enrollments, ordered by person id. People without an
    /// enrolled name are exported with an empty one.
    pub fn export(&self) -> Vec<EnrolledFace> {
        self.matcher
            .snapshot()
            .iter()
            .map(|(person_id, encoding)| EnrolledFace {
                person_id,
                name: self.roster.name(person_id).unwrap_or_default(),
                encoding: encoding.clone(),
            })
            .collect()
    }
}
