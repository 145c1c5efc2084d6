pub mod face_matcher;
pub mod gallery;
pub mod roster;
