// src/extractors/tokens.rs

// --- Imports ---
use once_cell::sync::Lazy;
use regex::Regex;

// --- Constants ---
/// Credit hours render as e.g. "4.000"; the first token carrying this anchors the grade.
pub const CREDIT_MARKER: &str = ".000";

// --- Token Shape Patterns (Lazy Static) ---
// Letter grades: A through F with D and E included for schools that use them.
static LETTER_GRADE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-F][+-]?$").expect("Failed to compile LETTER_GRADE_RE")
});

// Status codes such as W, IP, TR, AU, CR, NC.
static STATUS_CODE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Z]{1,2}$").expect("Failed to compile STATUS_CODE_RE")
});

/// Shape class of a single transcript token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Credit,
    LetterGrade,
    Status,
    Sign,
    Word,  // longer than two characters, e.g. a title word or an in-progress banner
    Other, // short fragments the tags cannot place
}

pub fn classify(token: &str) -> TokenKind {
    if token.contains(CREDIT_MARKER) {
        TokenKind::Credit
    } else if token == "+" || token == "-" {
        TokenKind::Sign
    } else if LETTER_GRADE_RE.is_match(token) {
        TokenKind::LetterGrade
    } else if STATUS_CODE_RE.is_match(token) {
        TokenKind::Status
    } else if token.chars().count() > 2 {
        TokenKind::Word
    } else {
        TokenKind::Other
    }
}

/// Index of the first credit-marker token, if any.
pub fn find_credit_marker(tokens: &[&str]) -> Option<usize> {
    tokens.iter().position(|t| classify(t) == TokenKind::Credit)
}
