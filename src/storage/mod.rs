// src/storage/mod.rs
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::utils::error::StorageError;

pub const TRANSCRIPT_PREFIX: &str = "StudentAcademicTranscript";
pub const ERROR_LOG_NAME: &str = "transcript_error_log.txt";
pub const RUN_SUMMARY_NAME: &str = "run_summary.json";
const TEMP_PREFIX: &str = ".tmp-";

/// Writes `path` through a temporary sibling that is renamed over it on success.
///
/// If `write` fails, or the rename fails, the previous contents of `path` are untouched
/// and the temporary file is removed.
pub fn write_atomically<P, F>(path: P, write: F) -> Result<(), StorageError>
where
    P: AsRef<Path>,
    F: FnOnce(&mut File) -> io::Result<()>,
{
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(".part")
        .tempfile_in(dir)?;
    write(temp.as_file_mut())?;
    temp.as_file().sync_all()?;

    temp.persist(path).map_err(|e| StorageError::ReplaceFailed {
        path: path.display().to_string(),
        source: e.error,
    })?;
    tracing::debug!("Atomically replaced {}", path.display());
    Ok(())
}

#[derive(Debug, Clone)]
pub struct StorageManager {
    base_dir: PathBuf,
    error_log: PathBuf,
}

impl StorageManager {
    /// Creates a new StorageManager over the transcript directory, creating it if missing.
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self, StorageError> {
        let base_path = base_dir.as_ref().to_path_buf();

        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(StorageError::IoError)?;
        }

        let error_log = base_path.join(ERROR_LOG_NAME);
        Ok(Self { base_dir: base_path, error_log })
    }

    /// Sends error-log lines to `path` instead of the transcript directory.
    pub fn with_error_log<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.error_log = path.as_ref().to_path_buf();
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn error_log_path(&self) -> &Path {
        &self.error_log
    }

    /// Where the downloaded transcript for `student_id` lives.
    pub fn transcript_path(&self, student_id: &str) -> PathBuf {
        self.base_dir.join(format!("{}{}.pdf", TRANSCRIPT_PREFIX, student_id))
    }

    /// Every PDF in the transcript directory, sorted by name, without in-flight temp files.
    pub fn list_transcripts(&self) -> Result<Vec<PathBuf>, StorageError> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(&self.base_dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let is_pdf = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("pdf"))
                .unwrap_or(false);
            let is_temp = path
                .file_name()
                .and_then(|name| name.to_str())
                .map(|name| name.starts_with(TEMP_PREFIX))
                .unwrap_or(false);
            if is_pdf && !is_temp {
                paths.push(path);
            }
        }
        paths.sort();
        tracing::debug!("Found {} transcript(s) in {}", paths.len(), self.base_dir.display());
        Ok(paths)
    }

    /// Empties the error log at the start of a run.
    pub fn reset_error_log(&self) -> Result<(), StorageError> {
        File::create(&self.error_log)?;
        Ok(())
    }

    /// Appends `{ID}: {reason}` to the error log.
    pub fn append_error(&self, student_id: &str, reason: &str) -> Result<(), StorageError> {
        let mut file = OpenOptions::new().create(true).append(true).open(&self.error_log)?;
        // one record per line even when the reason spans several
        let reason = reason.replace(['\r', '\n'], " ");
        writeln!(file, "{}: {}", student_id, reason)?;
        Ok(())
    }

    /// Writes the run summary as pretty JSON, stamped with the current time.
    pub fn save_run_summary<T: Serialize>(&self, summary: &T) -> Result<PathBuf, StorageError> {
        let file_path = self.base_dir.join(RUN_SUMMARY_NAME);

        let document = serde_json::json!({
            "generated_at": chrono::Utc::now().to_rfc3339(),
            "run": summary,
        });
        let contents = serde_json::to_string_pretty(&document)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;

        write_atomically(&file_path, |file| file.write_all(contents.as_bytes()))?;
        tracing::info!("Saved run summary to {}", file_path.display());
        Ok(file_path)
    }

    /// Saves an annotated text dump under `debug/`.
    pub fn save_debug_text(&self, student_id: &str, contents: &str) -> Result<PathBuf, StorageError> {
        let debug_dir = self.base_dir.join("debug");
        if !debug_dir.exists() {
            fs::create_dir_all(&debug_dir)?;
        }
        let file_path = debug_dir.join(format!("{}_annotated.txt", student_id));
        fs::write(&file_path, contents)?;
        tracing::info!("Saved debug text to {}", file_path.display());
        Ok(file_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_paths_and_listing() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path().join("TranscriptDownloads")).unwrap();
        assert!(storage.base_dir().is_dir());

        let path = storage.transcript_path("12345");
        assert!(path.ends_with("StudentAcademicTranscript12345.pdf"));

        fs::write(&path, b"%PDF").unwrap();
        fs::write(storage.transcript_path("00007"), b"%PDF").unwrap();
        fs::write(storage.base_dir().join(".tmp-abc.pdf"), b"partial").unwrap();
        fs::write(storage.base_dir().join("notes.txt"), b"ignore").unwrap();

        let listed = storage.list_transcripts().unwrap();
        let names: Vec<_> = listed.iter().filter_map(|p| p.file_name()?.to_str()).collect();
        assert_eq!(names, vec!["StudentAcademicTranscript00007.pdf", "StudentAcademicTranscript12345.pdf"]);
    }

    #[test]
    fn test_write_atomically_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.pdf");
        fs::write(&target, b"old").unwrap();

        write_atomically(&target, |f| f.write_all(b"new")).unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"new");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_failed_write_leaves_original() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.pdf");
        fs::write(&target, b"original").unwrap();

        let result = write_atomically(&target, |f| {
            f.write_all(b"half")?;
            Err(io::Error::new(io::ErrorKind::Other, "disk full"))
        });
        assert!(matches!(result, Err(StorageError::IoError(_))));
        assert_eq!(fs::read(&target).unwrap(), b"original");
        // the temporary sibling is cleaned up
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_failed_replace_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        // a non-empty directory cannot be replaced by a file
        let target = dir.path().join("occupied");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("keep.txt"), b"keep").unwrap();

        let result = write_atomically(&target, |f| f.write_all(b"new"));
        assert!(matches!(result, Err(StorageError::ReplaceFailed { .. })));
        assert_eq!(fs::read(target.join("keep.txt")).unwrap(), b"keep");
    }

    #[test]
    fn test_error_log_reset_and_append() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path()).unwrap();
        storage.append_error("1", "stale").unwrap();

        storage.reset_error_log().unwrap();
        storage.append_error("12345", "Document unreadable: bad xref").unwrap();
        storage.append_error("67890", "Transcript file not found\nsecond line").unwrap();

        let log = fs::read_to_string(storage.error_log_path()).unwrap();
        assert_eq!(
            log,
            "12345: Document unreadable: bad xref\n67890: Transcript file not found second line\n"
        );
    }

    #[test]
    fn test_run_summary_is_timestamped_json() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path()).unwrap();
        let path = storage
            .save_run_summary(&serde_json::json!({ "succeeded": 2, "failed": 1 }))
            .unwrap();

        let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(value["run"]["succeeded"], 2);
        assert!(value["generated_at"].as_str().is_some());
    }
}
