// src/config.rs
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::extractors::{CourseKey, ParseMode};
use crate::pdf::DEFAULT_MARKERS;
use crate::utils::AppError;

pub const DEFAULT_COURSE: &str = "MATH 221";
pub const DEFAULT_ROSTER: &str = "students.csv";
pub const DEFAULT_TRANSCRIPT_DIR: &str = "TranscriptDownloads";

/// Command Line Interface for transcript grade extraction and redaction
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Extract one course's grades from every roster student's transcript
    Grades(GradesArgs),
    /// Black out identity lines on the first page of transcripts
    Redact(RedactArgs),
}

#[derive(Args, Debug)]
pub struct CommonArgs {
    /// Directory holding StudentAcademicTranscript{ID}.pdf files
    #[arg(short, long, default_value = DEFAULT_TRANSCRIPT_DIR)]
    pub transcripts: PathBuf,

    /// Error log location (default: transcript_error_log.txt in the transcript directory)
    #[arg(long)]
    pub error_log: Option<PathBuf>,

    /// Marker phrase whose line is redacted; repeat for several (default: "Information for", "Name :")
    #[arg(long = "marker")]
    pub markers: Vec<String>,

    /// Number of documents processed in parallel
    #[arg(short, long, default_value_t = 1)]
    pub jobs: usize,
}

#[derive(Args, Debug)]
pub struct GradesArgs {
    /// Course as "DEPT NUM"
    #[arg(short, long, default_value = DEFAULT_COURSE)]
    pub course: String,

    /// Student roster CSV with ID, First and Last columns
    #[arg(short, long, default_value = DEFAULT_ROSTER)]
    pub roster: PathBuf,

    #[command(flatten)]
    pub common: CommonArgs,

    /// Fail a transcript on any course line that cannot be decoded
    #[arg(long)]
    pub strict: bool,

    /// Debug mode - save annotated text dumps for each transcript
    #[arg(short, long)]
    pub debug: bool,

    /// Redact each transcript after its grades are extracted
    #[arg(long)]
    pub redact: bool,
}

#[derive(Args, Debug)]
pub struct RedactArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Specific PDFs to redact (default: every PDF in the transcript directory)
    pub files: Vec<PathBuf>,
}

/// Everything one run needs, passed explicitly to the batch operations.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub course: CourseKey,
    pub transcript_dir: PathBuf,
    pub roster_path: PathBuf,
    pub error_log: Option<PathBuf>,
    pub markers: Vec<String>,
    pub parse_mode: ParseMode,
    pub jobs: usize,
    pub debug: bool,
    pub redact_after: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            course: CourseKey::new("MATH", "221"),
            transcript_dir: PathBuf::from(DEFAULT_TRANSCRIPT_DIR),
            roster_path: PathBuf::from(DEFAULT_ROSTER),
            error_log: None,
            markers: DEFAULT_MARKERS.iter().map(|m| m.to_string()).collect(),
            parse_mode: ParseMode::Lenient,
            jobs: 1,
            debug: false,
            redact_after: false,
        }
    }
}

impl RunConfig {
    fn apply_common(mut self, common: &CommonArgs) -> Self {
        self.transcript_dir = common.transcripts.clone();
        self.error_log = common.error_log.clone();
        if !common.markers.is_empty() {
            self.markers = common.markers.clone();
        }
        self.jobs = common.jobs.max(1);
        self
    }

    pub fn from_grades_args(args: &GradesArgs) -> Result<Self, AppError> {
        let course: CourseKey = args
            .course
            .parse()
            .map_err(|e| AppError::Config(format!("--course {:?}: {}", args.course, e)))?;
        let config = RunConfig {
            course,
            roster_path: args.roster.clone(),
            parse_mode: if args.strict { ParseMode::Strict } else { ParseMode::Lenient },
            debug: args.debug,
            redact_after: args.redact,
            ..RunConfig::default()
        };
        Ok(config.apply_common(&args.common))
    }

    pub fn from_redact_args(args: &RedactArgs) -> Self {
        RunConfig::default().apply_common(&args.common)
    }

    /// Roster column that receives the grades, e.g. "MATH 221".
    pub fn course_column(&self) -> String {
        self.course.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grades_defaults() {
        let cli = Cli::try_parse_from(["transcript_extractor", "grades"]).unwrap();
        let Command::Grades(args) = cli.command else {
            panic!("expected grades subcommand");
        };
        let config = RunConfig::from_grades_args(&args).unwrap();
        assert_eq!(config.course, CourseKey::new("MATH", "221"));
        assert_eq!(config.roster_path, PathBuf::from("students.csv"));
        assert_eq!(config.transcript_dir, PathBuf::from("TranscriptDownloads"));
        assert_eq!(config.markers, vec!["Information for", "Name :"]);
        assert_eq!(config.parse_mode, ParseMode::Lenient);
        assert_eq!(config.jobs, 1);
    }

    #[test]
    fn test_grades_overrides() {
        let cli = Cli::try_parse_from([
            "transcript_extractor",
            "grades",
            "--course",
            "CS 171",
            "--strict",
            "--redact",
            "--jobs",
            "0",
            "--marker",
            "Student :",
        ])
        .unwrap();
        let Command::Grades(args) = cli.command else {
            panic!("expected grades subcommand");
        };
        let config = RunConfig::from_grades_args(&args).unwrap();
        assert_eq!(config.course_column(), "CS 171");
        assert_eq!(config.parse_mode, ParseMode::Strict);
        assert!(config.redact_after);
        assert_eq!(config.jobs, 1);
        assert_eq!(config.markers, vec!["Student :"]);
    }

    #[test]
    fn test_course_with_wrong_token_count_is_config_error() {
        let cli = Cli::try_parse_from(["transcript_extractor", "grades", "--course", "MATH221"]).unwrap();
        let Command::Grades(args) = cli.command else {
            panic!("expected grades subcommand");
        };
        assert!(matches!(RunConfig::from_grades_args(&args), Err(AppError::Config(_))));
    }

    #[test]
    fn test_redact_files() {
        let cli = Cli::try_parse_from(["transcript_extractor", "redact", "a.pdf", "b.pdf"]).unwrap();
        let Command::Redact(args) = cli.command else {
            panic!("expected redact subcommand");
        };
        assert_eq!(args.files.len(), 2);
        let config = RunConfig::from_redact_args(&args);
        assert_eq!(config.transcript_dir, PathBuf::from("TranscriptDownloads"));
    }
}
