//! Face-presence attendance: match face encodings against enrolled people
//! and turn per-frame sightings into debounced entry and exit events.

pub mod detection;
pub mod presence;
pub mod recognition;
pub mod session;
pub mod shared;
