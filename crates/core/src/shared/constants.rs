/// Number of values in a face encoding.
pub const ENCODING_DIMENSIONS: usize = 128;
/// Serialized size of a face encoding: 128 little-endian `f64`s.
pub const ENCODING_BYTES: usize = ENCODING_DIMENSIONS * std::mem::size_of::<f64>();

/// Maximum Euclidean distance accepted as a match.
pub const DEFAULT_TOLERANCE: f64 = 0.6;

/// Consecutive sightings required to confirm an entry (~0.5 second at 10 fps).
pub const DEFAULT_ENTRY_THRESHOLD: u32 = 5;
/// Consecutive misses required to confirm an exit (~1 second at 10 fps).
pub const DEFAULT_EXIT_THRESHOLD: u32 = 10;

pub const DEFAULT_FRAME_QUEUE_CAPACITY: usize = 8;

pub const SETTINGS_DIR_NAME: &str = "attendance";
pub const SETTINGS_FILE_NAME: &str = "settings.json";

pub const GALLERY_EXTENSIONS: &[&str] = &["bin", "gallery"];
