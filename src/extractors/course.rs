// src/extractors/course.rs
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::utils::error::ExtractError;

// --- Sentinels written into the roster cell ---
pub const IN_PROGRESS: &str = "X";
pub const NOT_FOUND: &str = "N";
pub const FAILED: &str = "ERROR";

/// Department + course number, matched token-for-token against transcript lines.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CourseKey {
    pub department: String, // e.g., "MATH"
    pub number: String,     // e.g., "221"
}

impl CourseKey {
    pub fn new(department: impl Into<String>, number: impl Into<String>) -> Self {
        Self {
            department: department.into(),
            number: number.into(),
        }
    }

    /// True when the first two tokens of a line name this course.
    /// No case folding or zero-padding normalization.
    pub fn matches(&self, tokens: &[&str]) -> bool {
        matches!(tokens, [dept, num, ..] if *dept == self.department && *num == self.number)
    }
}

impl FromStr for CourseKey {
    type Err = ExtractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = s.split_whitespace().collect();
        match tokens.as_slice() {
            [dept, num] => Ok(Self::new(*dept, *num)),
            _ => Err(ExtractError::InvalidCourse(s.to_string())),
        }
    }
}

impl fmt::Display for CourseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.department, self.number)
    }
}

/// How a grade token was recovered from its course line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Decoding {
    Tagged,     // token shapes were unambiguous
    Positional, // fell back to offset arithmetic around the credit marker
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GradeEntry {
    pub grade: String,
    pub line_number: usize, // 1-based line in the transcript text
    pub decoding: Decoding,
}

/// Every grade recorded for one course in one transcript, first attempt first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GradeRecord {
    pub course: CourseKey,
    pub entries: Vec<GradeEntry>,
}

impl GradeRecord {
    pub fn new(course: CourseKey) -> Self {
        Self { course, entries: Vec::new() }
    }

    pub fn grades(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.grade.as_str()).collect()
    }

    /// An empty record means the course was never found.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Roster cell text: grades joined by ", ", or the not-found sentinel.
    pub fn display_cell(&self) -> String {
        if self.is_empty() {
            NOT_FOUND.to_string()
        } else {
            self.grades().join(", ")
        }
    }
}
