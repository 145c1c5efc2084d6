use serde::{Deserialize, Serialize};

use crate::recognition::domain::face_matcher::FaceMatch;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::person::PersonId;

/// One resolved face in one frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub person_id: Option<PersonId>,
    pub confidence: f64,
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(person_id: Option<PersonId>, confidence: f64, bbox: BoundingBox) -> Self {
        Self {
            person_id,
            confidence,
            bbox,
        }
    }

    pub fn from_match(face: FaceMatch, bbox: BoundingBox) -> Self {
        Self::new(face.person_id, face.confidence, bbox)
    }
}
