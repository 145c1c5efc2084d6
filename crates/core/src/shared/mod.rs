pub mod bounding_box;
pub mod clock;
pub mod constants;
pub mod face_encoding;
pub mod person;
pub mod settings;
