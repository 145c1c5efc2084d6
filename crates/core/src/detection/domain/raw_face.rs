use serde::{Deserialize, Serialize};

use crate::shared::bounding_box::BoundingBox;

/// A face as delivered by the external detector: where it is and its
/// feature vector. The vector is validated only when it is matched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawFace {
    pub bbox: BoundingBox,
    pub encoding: Vec<f64>,
}

impl RawFace {
    pub fn new(bbox: BoundingBox, encoding: Vec<f64>) -> Self {
        Self { bbox, encoding }
    }
}
