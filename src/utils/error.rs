// src/utils/error.rs
use thiserror::Error;

// Define specific error types for different parts of the application
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Invalid course key '{0}': expected 'DEPT NUM'")]
    InvalidCourse(String),

    #[error("Unparseable course line {line_number}: '{line}'")]
    UnparseableCourseLine { line_number: usize, line: String },
}

#[derive(Error, Debug)]
pub enum PdfError {
    #[error("Document unreadable: {0}")]
    Unreadable(String), // Cannot be opened, parsed or decoded

    #[error("PDF error: {0}")]
    Lopdf(#[from] lopdf::Error),

    #[error("Page {0} not found")]
    PageNotFound(u32),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Persistence failed: {0}")]
    Persistence(#[from] StorageError),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Atomic replace of {path} failed: {source}")]
    ReplaceFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum RosterError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Roster is missing required column '{0}'")]
    MissingColumn(&'static str),

    #[error("Unknown student id '{0}'")]
    UnknownStudent(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error), // Automatically convert IO errors

    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractError),

    #[error("PDF processing failed: {0}")]
    Pdf(#[from] PdfError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Roster error: {0}")]
    Roster(#[from] RosterError),

    #[error("Data processing failed: {0}")]
    Processing(String),
}
