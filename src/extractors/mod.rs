// src/extractors/mod.rs
pub mod course;
pub mod grades;
pub mod tokens;

// Re-export key extraction types for convenience
pub use course::{CourseKey, FAILED, NOT_FOUND};
pub use grades::{GradeExtractor, ParseMode};
