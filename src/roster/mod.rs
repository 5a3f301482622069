// src/roster/mod.rs
pub mod models;

use std::io::Read;
use std::path::Path;

use crate::roster::models::{IdentityColumns, FIRST_NAME_COLUMN, ID_COLUMN, LAST_NAME_COLUMN};
use crate::storage::write_atomically;
use crate::utils::error::RosterError;

pub use models::StudentRow;

/// Student list read from CSV. Unknown columns are carried through unchanged.
#[derive(Debug, Clone)]
pub struct Roster {
    headers: Vec<String>,
    records: Vec<Vec<String>>,
    columns: IdentityColumns,
}

fn clean_header(header: &str) -> String {
    header.trim_start_matches('\u{feff}').trim().to_string()
}

impl Roster {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, RosterError> {
        let path = path.as_ref();
        let reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
        let roster = Self::from_csv(reader)?;
        tracing::info!("Loaded {} student(s) from {}", roster.records.len(), path.display());
        Ok(roster)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, RosterError> {
        Self::from_csv(csv::ReaderBuilder::new().flexible(true).from_reader(reader))
    }

    fn from_csv<R: Read>(mut reader: csv::Reader<R>) -> Result<Self, RosterError> {
        let headers: Vec<String> = reader.headers()?.iter().map(clean_header).collect();
        let position = |name: &'static str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or(RosterError::MissingColumn(name))
        };
        let columns = IdentityColumns {
            id: position(ID_COLUMN)?,
            first: position(FIRST_NAME_COLUMN)?,
            last: position(LAST_NAME_COLUMN)?,
        };

        let mut records = Vec::new();
        for record in reader.records() {
            let mut row: Vec<String> = record?.iter().map(String::from).collect();
            // short rows are padded so every column can be addressed
            if row.len() < headers.len() {
                row.resize(headers.len(), String::new());
            }
            records.push(row);
        }

        Ok(Self { headers, records, columns })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn students(&self) -> Vec<StudentRow> {
        self.records
            .iter()
            .map(|row| StudentRow {
                id: row[self.columns.id].trim().to_string(),
                first_name: row[self.columns.first].trim().to_string(),
                last_name: row[self.columns.last].trim().to_string(),
            })
            .collect()
    }

    fn column_index(&self, column: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == column)
    }

    pub fn value(&self, student_id: &str, column: &str) -> Option<&str> {
        let col = self.column_index(column)?;
        self.records
            .iter()
            .find(|row| row[self.columns.id].trim() == student_id)
            .map(|row| row[col].as_str())
    }

    /// Writes `value` into `column` for every row of `student_id`, creating the column if needed.
    pub fn set_grade(&mut self, student_id: &str, column: &str, value: &str) -> Result<(), RosterError> {
        let id_col = self.columns.id;
        if !self.records.iter().any(|row| row[id_col].trim() == student_id) {
            return Err(RosterError::UnknownStudent(student_id.to_string()));
        }

        let col = match self.column_index(column) {
            Some(col) => col,
            None => {
                tracing::debug!("Adding roster column '{}'", column);
                self.headers.push(column.to_string());
                for row in &mut self.records {
                    row.resize(self.headers.len(), String::new());
                }
                self.headers.len() - 1
            }
        };

        for row in self.records.iter_mut().filter(|row| row[id_col].trim() == student_id) {
            row[col] = value.to_string();
        }
        Ok(())
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), RosterError> {
        let path = path.as_ref();
        write_atomically(path, |file| {
            let mut writer = csv::Writer::from_writer(file);
            writer.write_record(&self.headers)?;
            for row in &self.records {
                writer.write_record(row)?;
            }
            writer.flush()
        })?;
        tracing::info!("Saved roster to {}", path.display());
        Ok(())
    }
}
