// src/pdf/mod.rs
pub mod document;
pub mod fonts;
pub mod geometry;
pub mod layout;
pub mod redact;

pub use document::TranscriptDocument;
pub use redact::{IdentityRedactor, DEFAULT_MARKERS};
