// src/roster/models.rs
use serde::Serialize;

// Required roster columns
pub const ID_COLUMN: &str = "ID";
pub const FIRST_NAME_COLUMN: &str = "First";
pub const LAST_NAME_COLUMN: &str = "Last";

/// Identity of one student as listed in the roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentRow {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
}

impl StudentRow {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

// Column positions of the required fields within a record.
#[derive(Debug, Clone, Copy)]
pub(crate) struct IdentityColumns {
    pub id: usize,
    pub first: usize,
    pub last: usize,
}
