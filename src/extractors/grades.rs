// src/extractors/grades.rs

// --- Imports ---
use crate::extractors::course::{CourseKey, Decoding, GradeEntry, GradeRecord, IN_PROGRESS};
use crate::extractors::tokens::{classify, find_credit_marker, TokenKind};
use crate::utils::error::ExtractError;

// --- Constants ---
/// Lines with this many tokens or fewer cannot hold dept, number, title, grade and credits.
const MIN_COURSE_LINE_TOKENS: usize = 5;

/// How malformed course lines are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    #[default]
    Lenient, // skip lines that cannot be decoded
    Strict,  // fail on the first course line that cannot be decoded
}

// --- Main Extractor Structure ---
#[derive(Debug, Clone, Default)]
pub struct GradeExtractor {
    mode: ParseMode,
}

impl GradeExtractor {
    pub fn new(mode: ParseMode) -> Self {
        Self { mode }
    }

    /// Extracts every grade recorded for `course` in document order.
    ///
    /// A course taken several times appears on several lines; each line contributes
    /// at most one grade. An empty record is a valid result, not an error.
    pub fn extract(&self, text: &str, course: &CourseKey) -> Result<GradeRecord, ExtractError> {
        let mut record = GradeRecord::new(course.clone());

        for (idx, line) in text.split('\n').enumerate() {
            let line_number = idx + 1;
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() <= MIN_COURSE_LINE_TOKENS || !course.matches(&tokens) {
                continue;
            }

            match decode_course_line(&tokens) {
                Some((grade, decoding)) => {
                    tracing::debug!("{} line {}: grade '{}' ({:?})", course, line_number, grade, decoding);
                    record.entries.push(GradeEntry { grade, line_number, decoding });
                }
                None if self.mode == ParseMode::Strict => {
                    return Err(ExtractError::UnparseableCourseLine {
                        line_number,
                        line: line.trim().to_string(),
                    });
                }
                None => {
                    tracing::debug!("Skipping undecodable {} line {}: '{}'", course, line_number, line.trim());
                }
            }
        }

        tracing::info!("Found {} grade(s) for {}", record.entries.len(), course);
        Ok(record)
    }
}

/// Decodes the grade of a course line from the tokens just before its credit marker.
/// Returns None when there is no marker or nothing usable precedes it.
pub fn decode_course_line(tokens: &[&str]) -> Option<(String, Decoding)> {
    let marker = find_credit_marker(tokens)?;
    let prev_idx = marker.checked_sub(1)?;

    if let Some(grade) = decode_tagged(tokens, prev_idx) {
        return Some((grade, Decoding::Tagged));
    }
    decode_positional(tokens, prev_idx).map(|grade| (grade, Decoding::Positional))
}

// Field-tagging pass: only answers when the token shapes leave no doubt.
fn decode_tagged(tokens: &[&str], prev_idx: usize) -> Option<String> {
    let prev = tokens[prev_idx];
    match classify(prev) {
        TokenKind::LetterGrade | TokenKind::Status => Some(prev.to_string()),
        TokenKind::Word => Some(IN_PROGRESS.to_string()),
        TokenKind::Sign => {
            let letter = tokens.get(prev_idx.checked_sub(1)?)?;
            (classify(letter) == TokenKind::LetterGrade).then(|| format!("{}{}", letter, prev))
        }
        TokenKind::Credit | TokenKind::Other => None,
    }
}

// Offset arithmetic around the credit marker.
fn decode_positional(tokens: &[&str], prev_idx: usize) -> Option<String> {
    let prev = tokens[prev_idx];
    if prev.chars().count() > 2 {
        Some(IN_PROGRESS.to_string())
    } else if prev == "+" || prev == "-" {
        let letter = tokens.get(prev_idx.checked_sub(1)?)?;
        Some(format!("{}{}", letter, prev))
    } else {
        Some(prev.to_string())
    }
}
