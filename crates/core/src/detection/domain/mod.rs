pub mod detection_source;
pub mod raw_face;
