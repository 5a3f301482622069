// src/utils/text_debug.rs
use crate::extractors::grades::decode_course_line;
use crate::extractors::tokens::find_credit_marker;
use crate::extractors::CourseKey;

/// Renders transcript text with one annotation per line: token count, whether the line
/// is a course line for `course`, and how its grade was decoded.
///
/// The credit marker token is wrapped in `[` `]` so misplaced columns stand out.
pub fn annotate_transcript(text: &str, course: &CourseKey) -> String {
    let mut out = format!("# Annotated transcript text for {}\n", course);
    out.push_str("# line | tokens | annotation | text\n");

    for (idx, line) in text.split('\n').enumerate() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let annotation = if !course.matches(&tokens) {
            String::new()
        } else if tokens.len() <= 5 {
            "course, too short".to_string()
        } else {
            match decode_course_line(&tokens) {
                Some((grade, decoding)) => format!("GRADE {} ({:?})", grade, decoding),
                None => "course, no grade".to_string(),
            }
        };

        let rendered = match find_credit_marker(&tokens) {
            Some(marker) => tokens
                .iter()
                .enumerate()
                .map(|(i, t)| if i == marker { format!("[{}]", t) } else { t.to_string() })
                .collect::<Vec<_>>()
                .join(" "),
            None => tokens.join(" "),
        };

        out.push_str(&format!("{:>5} | {:>6} | {:<24} | {}\n", idx + 1, tokens.len(), annotation, rendered));
    }
    out
}
