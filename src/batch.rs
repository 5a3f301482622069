// src/batch.rs
//! Batch driver: runs every document on a bounded pool of blocking workers and
//! records per-student outcomes without letting one failure stop the run.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::config::RunConfig;
use crate::extractors::{CourseKey, GradeExtractor, FAILED, NOT_FOUND};
use crate::pdf::{IdentityRedactor, TranscriptDocument};
use crate::roster::{Roster, StudentRow};
use crate::storage::StorageManager;
use crate::utils::text_debug::annotate_transcript;
use crate::utils::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Graded,
    NotFound,
    Redacted,
    Unchanged,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentOutcome {
    pub id: String,
    pub status: OutcomeStatus,
    pub value: String, // roster cell for grades runs, file name for redact runs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course: Option<String>,
    pub succeeded: usize,
    pub failed: usize,
    pub outcomes: Vec<DocumentOutcome>,
}

impl BatchReport {
    fn new(command: &str, course: Option<String>) -> Self {
        Self {
            command: command.to_string(),
            course,
            ..Default::default()
        }
    }

    fn record(&mut self, outcome: DocumentOutcome) {
        if outcome.status == OutcomeStatus::Failed {
            self.failed += 1;
        } else {
            self.succeeded += 1;
        }
        self.outcomes.push(outcome);
    }
}

// Shared, read-only state handed to every grades worker.
struct GradeJob {
    storage: StorageManager,
    extractor: GradeExtractor,
    redactor: IdentityRedactor,
    course: CourseKey,
    debug: bool,
    redact_after: bool,
}

fn open_storage(config: &RunConfig) -> Result<StorageManager, AppError> {
    let storage = StorageManager::new(&config.transcript_dir)?;
    Ok(match &config.error_log {
        Some(path) => storage.with_error_log(path),
        None => storage,
    })
}

/// Runs `work` for every item with at most `jobs` running at once, preserving input order.
/// A panicking worker becomes an `Err` for its own item only.
async fn run_bounded<T, R, F>(items: Vec<T>, jobs: usize, work: F) -> Vec<(T, Result<R, String>)>
where
    T: Clone + Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Result<R, AppError> + Send + Sync + 'static,
{
    let semaphore = Arc::new(Semaphore::new(jobs.max(1)));
    let work = Arc::new(work);

    let handles: Vec<(T, JoinHandle<Result<R, String>>)> = items
        .into_iter()
        .map(|item| {
            let semaphore = Arc::clone(&semaphore);
            let work = Arc::clone(&work);
            let task_item = item.clone();
            let handle = tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| format!("Worker pool closed: {}", e))?;
                match tokio::task::spawn_blocking(move || (*work)(task_item)).await {
                    Ok(result) => result.map_err(|e| e.to_string()),
                    Err(e) if e.is_panic() => Err("Worker panicked".to_string()),
                    Err(e) => Err(format!("Worker cancelled: {}", e)),
                }
            });
            (item, handle)
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for (item, handle) in handles {
        let result = match handle.await {
            Ok(result) => result,
            Err(e) => Err(format!("Worker task failed: {}", e)),
        };
        results.push((item, result));
    }
    results
}

// One student: transcript -> text -> grades, optionally followed by redaction.
fn grade_student(job: &GradeJob, student: &StudentRow) -> Result<(String, bool), AppError> {
    let path = job.storage.transcript_path(&student.id);
    if !path.is_file() {
        return Err(AppError::Processing(format!("Transcript file not found: {}", path.display())));
    }

    let document = TranscriptDocument::open(&path)?;
    let text = document.full_text();
    tracing::debug!("{}: {} page(s), {} chars of text", student.id, document.pages.len(), text.len());

    if job.debug {
        let dump = annotate_transcript(&text, &job.course);
        if let Err(e) = job.storage.save_debug_text(&student.id, &dump) {
            tracing::warn!("Failed to save debug text for {}: {}", student.id, e);
        }
    }

    let record = job.extractor.extract(&text, &job.course)?;
    let cell = record.display_cell();

    let redacted = if job.redact_after {
        job.redactor.redact_file(&path)?.modified
    } else {
        false
    };
    Ok((cell, redacted))
}

/// Extracts the configured course for every roster student and writes the roster back.
pub async fn run_grades(config: &RunConfig) -> Result<BatchReport, AppError> {
    let storage = open_storage(config)?;
    storage.reset_error_log()?;

    let mut roster = Roster::load(&config.roster_path)?;
    if roster.is_empty() {
        tracing::warn!("Roster {} lists no students", config.roster_path.display());
    }
    // one worker per transcript; a repeated ID shares the first row's outcome
    let mut seen = HashSet::new();
    let mut students = roster.students();
    students.retain(|student| {
        let first = seen.insert(student.id.clone());
        if !first {
            tracing::warn!("Student {} is listed more than once in the roster", student.id);
        }
        first
    });
    let column = config.course_column();
    tracing::info!(
        "Extracting {} for {} student(s) with {} worker(s)",
        column,
        students.len(),
        config.jobs
    );

    let job = GradeJob {
        storage: storage.clone(),
        extractor: GradeExtractor::new(config.parse_mode),
        redactor: IdentityRedactor::new(config.markers.clone()),
        course: config.course.clone(),
        debug: config.debug,
        redact_after: config.redact_after,
    };

    let results = run_bounded(students, config.jobs, move |student: StudentRow| {
        grade_student(&job, &student)
    })
    .await;

    let mut report = BatchReport::new("grades", Some(column.clone()));
    for (student, result) in results {
        let outcome = match result {
            Ok((cell, redacted)) => {
                tracing::info!(
                    "{} ({}): {}{}",
                    student.id,
                    student.display_name(),
                    cell,
                    if redacted { " [redacted]" } else { "" }
                );
                let status = if cell == NOT_FOUND { OutcomeStatus::NotFound } else { OutcomeStatus::Graded };
                DocumentOutcome { id: student.id.clone(), status, value: cell, error: None }
            }
            Err(reason) => {
                tracing::error!("{} ({}): {}", student.id, student.display_name(), reason);
                if let Err(e) = storage.append_error(&student.id, &reason) {
                    tracing::warn!("Failed to append to error log: {}", e);
                }
                DocumentOutcome {
                    id: student.id.clone(),
                    status: OutcomeStatus::Failed,
                    value: FAILED.to_string(),
                    error: Some(reason),
                }
            }
        };
        roster.set_grade(&student.id, &column, &outcome.value)?;
        report.record(outcome);
    }

    roster.save(&config.roster_path)?;
    storage.save_run_summary(&report)?;
    if report.failed > 0 {
        tracing::warn!("{} failure(s) logged to {}", report.failed, storage.error_log_path().display());
    }
    tracing::info!("Grades finished. Success: {}, Failures: {}", report.succeeded, report.failed);
    Ok(report)
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Redacts `files`, or every PDF in the transcript directory when `files` is empty.
pub async fn run_redact(config: &RunConfig, files: Vec<PathBuf>) -> Result<BatchReport, AppError> {
    let storage = open_storage(config)?;
    let targets = if files.is_empty() { storage.list_transcripts()? } else { files };
    tracing::info!(
        "Redacting {} file(s) under {} with {} worker(s)",
        targets.len(),
        storage.base_dir().display(),
        config.jobs
    );

    let redactor = IdentityRedactor::new(config.markers.clone());
    tracing::debug!("Markers: {:?}", redactor.markers());
    let results = run_bounded(targets, config.jobs, move |path: PathBuf| {
        redactor.redact_file(&path).map_err(AppError::from)
    })
    .await;

    let mut report = BatchReport::new("redact", None);
    for (path, result) in results {
        let label = file_label(&path);
        let outcome = match result {
            Ok(outcome) => {
                let status = if outcome.modified { OutcomeStatus::Redacted } else { OutcomeStatus::Unchanged };
                DocumentOutcome { id: label.clone(), status, value: label, error: None }
            }
            Err(reason) => {
                tracing::error!("{}: {}", label, reason);
                if let Err(e) = storage.append_error(&label, &reason) {
                    tracing::warn!("Failed to append to error log: {}", e);
                }
                DocumentOutcome {
                    id: label.clone(),
                    status: OutcomeStatus::Failed,
                    value: label,
                    error: Some(reason),
                }
            }
        };
        report.record(outcome);
    }

    storage.save_run_summary(&report)?;
    tracing::info!("Redaction finished. Success: {}, Failures: {}", report.succeeded, report.failed);
    Ok(report)
}
