use serde::{Deserialize, Serialize};

use crate::shared::face_encoding::EncodingError;
use crate::shared::person::PersonId;

/// Outcome of resolving one face: a known person with a confidence, or
/// unknown with confidence 0.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FaceMatch {
    pub person_id: Option<PersonId>,
    pub confidence: f64,
}

impl FaceMatch {
    pub fn known(person_id: PersonId, confidence: f64) -> Self {
        Self {
            person_id: Some(person_id),
            confidence,
        }
    }

    pub fn unknown() -> Self {
        Self {
            person_id: None,
            confidence: 0.0,
        }
    }

    pub fn is_known(&self) -> bool {
        self.person_id.is_some()
    }
}

/// Domain interface for resolving face encodings to identities.
///
/// Implementations must be safe to call while the set of known faces is
/// being changed from another thread.
pub trait FaceMatcher: Send + Sync {
    fn match_face(&self, encoding: &[f64]) -> Result<FaceMatch, EncodingError>;

    /// Resolves every face of one frame against the same set of known faces.
    fn match_frame(&self, encodings: &[&[f64]]) -> Result<Vec<FaceMatch>, EncodingError>;
}
