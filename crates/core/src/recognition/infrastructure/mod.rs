pub mod gallery_file;
pub mod gallery_matcher;
