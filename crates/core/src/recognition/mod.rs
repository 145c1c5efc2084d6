pub mod domain;
pub mod enrollment;
pub mod infrastructure;
