//! Hospital directory entries and the plain-text department list.
//!
//! Entries are what the CLI writes into the structured tables. The text
//! list is the hospital guide document whose department section is used
//! when the departments table is still empty.

use crate::error::{IoError, Result};
use crate::io::read_file;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Line that opens the department section of the guide.
const SECTION_START: &str = "운영 진료과";
/// Line that closes it.
const SECTION_END: &str = "진료과 설명";
/// Longest line (in characters) accepted as a department name.
const MAX_NAME_CHARS: usize = 12;

/// A department to insert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDepartment {
    /// Display name, e.g. "내과". Unique.
    pub name: String,
    /// Short code, e.g. "IM".
    #[serde(default)]
    pub code: Option<String>,
    /// What the department treats.
    #[serde(default)]
    pub description: Option<String>,
    /// Direct phone line.
    #[serde(default)]
    pub phone: Option<String>,
    /// Building and floor.
    #[serde(default)]
    pub location: Option<String>,
    /// Symptom words that route a patient here.
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl NewDepartment {
    /// Department with only a name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// A doctor to insert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDoctor {
    /// Doctor name.
    pub name: String,
    /// Name of an existing department.
    pub department: String,
    /// Position, e.g. "교수".
    #[serde(default)]
    pub title: Option<String>,
    /// Clinical specialty.
    #[serde(default)]
    pub specialty: Option<String>,
    /// Free-text clinic schedule.
    #[serde(default)]
    pub schedule: Option<String>,
}

/// A reservation to insert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReservation {
    /// Conversation the reservation belongs to.
    pub conversation_id: String,
    /// Name of an existing department.
    pub department: String,
    /// Doctor name within the department, if chosen.
    #[serde(default)]
    pub doctor: Option<String>,
    /// Patient name.
    #[serde(default)]
    pub patient_name: Option<String>,
    /// Appointment time as entered, e.g. "2026-10-20 10:30".
    pub reserved_at: String,
    /// Reservation status; "confirmed" when absent.
    #[serde(default)]
    pub status: Option<String>,
}

/// Extracts department names from the hospital guide text.
///
/// Takes the lines after the `운영 진료과` heading that end in `과` and are
/// short enough to be a name, stopping at the `진료과 설명` heading or the
/// next bracketed section (`[...]`). Bullets and numbering are stripped and
/// duplicates dropped, keeping first-seen order.
#[must_use]
pub fn parse_department_list(text: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let mut in_section = false;

    for raw in text.lines() {
        let line = raw.trim();
        if !in_section {
            in_section = line.contains(SECTION_START);
            continue;
        }
        if line.starts_with('[') || line.contains(SECTION_END) {
            break;
        }

        let name = line
            .trim_start_matches(|c: char| {
                c == '-' || c == '*' || c == '•' || c == '·' || c == '.' || c.is_ascii_digit()
            })
            .trim();
        if name.ends_with('과')
            && name.chars().count() <= MAX_NAME_CHARS
            && !names.iter().any(|n| n == name)
        {
            names.push(name.to_string());
        }
    }

    names
}

/// Reads and parses a department guide file.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn load_department_list(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        return Err(IoError::FileNotFound {
            path: path.display().to_string(),
        }
        .into());
    }
    Ok(parse_department_list(&read_file(path)?))
}
