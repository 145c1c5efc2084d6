//! Nearest-neighbour face matcher over a swappable gallery snapshot.
//!
//! Readers clone the current `Arc<Gallery>` and match without holding the
//! lock; writers build a new snapshot from the current one and swap it in
//! under the write lock. A match therefore always sees exactly one gallery
//! version, never a half-applied mutation.

use std::sync::{Arc, PoisonError, RwLock};

use crate::recognition::domain::face_matcher::{FaceMatch, FaceMatcher};
use crate::recognition::domain::gallery::Gallery;
use crate::shared::constants::DEFAULT_TOLERANCE;
use crate::shared::face_encoding::{EncodingError, FaceEncoding};
use crate::shared::person::PersonId;

pub struct GalleryMatcher {
    gallery: RwLock<Arc<Gallery>>,
    tolerance: f64,
}

impl GalleryMatcher {
    pub fn new(tolerance: f64) -> Self {
        Self::with_gallery(Gallery::empty(), tolerance)
    }

    pub fn with_gallery(gallery: Gallery, tolerance: f64) -> Self {
        Self {
            gallery: RwLock::new(Arc::new(gallery)),
            tolerance,
        }
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// The gallery as of now. Later mutations do not affect the snapshot.
    pub fn snapshot(&self) -> Arc<Gallery> {
        // The guarded value is only ever replaced whole, so a poisoned lock
        // still holds a consistent snapshot.
        Arc::clone(&self.gallery.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn add(&self, person_id: PersonId, encoding: FaceEncoding) {
        self.update(|g| g.with_person(person_id, encoding));
        log::debug!("Gallery: added person {person_id}");
    }

    pub fn add_raw(&self, person_id: PersonId, encoding: &[f64]) -> Result<(), EncodingError> {
        self.add(person_id, FaceEncoding::from_slice(encoding)?);
        Ok(())
    }

    /// Returns whether `person_id` was enrolled.
    pub fn remove(&self, person_id: PersonId) -> bool {
        let mut removed = false;
        self.update(|g| {
            removed = g.contains(person_id);
            g.without_person(person_id)
        });
        if removed {
            log::debug!("Gallery: removed person {person_id}");
        }
        removed
    }

    /// Replaces the whole gallery, e.g. when reloading enrollments.
    pub fn replace(&self, gallery: Gallery) {
        self.update(|g| g.succeeded_by(gallery));
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    fn update(&self, f: impl FnOnce(&Gallery) -> Gallery) {
        let mut guard = self.gallery.write().unwrap_or_else(PoisonError::into_inner);
        let next = f(&guard);
        *guard = Arc::new(next);
    }
}

impl Default for GalleryMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE)
    }
}

impl FaceMatcher for GalleryMatcher {
    fn match_face(&self, encoding: &[f64]) -> Result<FaceMatch, EncodingError> {
        let query = FaceEncoding::from_slice(encoding)?;
        Ok(self.snapshot().best_match(&query, self.tolerance))
    }

    fn match_frame(&self, encodings: &[&[f64]]) -> Result<Vec<FaceMatch>, EncodingError> {
        let queries = encodings
            .iter()
            .map(|e| FaceEncoding::from_slice(e))
            .collect::<Result<Vec<_>, _>>()?;
        if queries.is_empty() {
            return Ok(Vec::new());
        }
        let gallery = self.snapshot();
        Ok(queries
            .iter()
            .map(|q| gallery.best_match(q, self.tolerance))
            .collect())
    }
}
