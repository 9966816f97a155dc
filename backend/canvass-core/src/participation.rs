// src/participation.rs
use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info};

use crate::csv_decode::Record;

// --- Column names shared by the master list and the activity data ---

pub const EMPLOYEE_CODE: &str = "Employee Code";
pub const EMPLOYEE_NAME: &str = "Employee Name";
pub const DIVISION: &str = "Division";
pub const DESIGNATION: &str = "Designation";
pub const ACTIVITY_DATE: &str = "Date";

pub const ACTIVITY_DATE_FORMAT: &str = "%d/%m/%Y";

static WINDOW_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})-(\d{4})$").expect("window pattern is valid"));

// --- Identifiers ---

/// An employee code after trim + lower-case. Only built by [`normalize_identifier`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedId(String);

impl NormalizedId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for NormalizedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn normalize_identifier(raw: &str) -> NormalizedId {
    NormalizedId(raw.trim().to_lowercase())
}

/// Normalized `Employee Code` of a record, or `None` when it is absent or blank.
pub fn record_identifier(record: &Record) -> Option<NormalizedId> {
    let id = normalize_identifier(record.get(EMPLOYEE_CODE)?);
    (!id.is_empty()).then_some(id)
}

// --- Window selection ---

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WindowParseError {
    #[error("Window must be 'all' or MM-YYYY, got '{0}'")]
    Format(String),
    #[error("Month {0} is out of range (1-12)")]
    MonthOutOfRange(u32),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WindowSelector {
    #[default]
    AllTime,
    Month { month: u32, year: i32 },
}

impl WindowSelector {
    pub fn month(month: u32, year: i32) -> Result<Self, WindowParseError> {
        if !(1..=12).contains(&month) {
            return Err(WindowParseError::MonthOutOfRange(month));
        }
        Ok(WindowSelector::Month { month, year })
    }

    /// Whether an activity date belongs to this window.
    pub fn contains(&self, date: NaiveDate) -> bool {
        match *self {
            WindowSelector::AllTime => true,
            WindowSelector::Month { month, year } => date.month() == month && date.year() == year,
        }
    }
}

impl FromStr for WindowSelector {
    type Err = WindowParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(WindowSelector::AllTime);
        }

        let caps = WINDOW_PATTERN
            .captures(s)
            .ok_or_else(|| WindowParseError::Format(s.to_string()))?;
        let month: u32 = caps[1]
            .parse()
            .map_err(|_| WindowParseError::Format(s.to_string()))?;
        let year: i32 = caps[2]
            .parse()
            .map_err(|_| WindowParseError::Format(s.to_string()))?;
        WindowSelector::month(month, year)
    }
}

impl fmt::Display for WindowSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowSelector::AllTime => f.write_str("all"),
            WindowSelector::Month { month, year } => write!(f, "{:02}-{}", month, year),
        }
    }
}

/// Parses a `DD/MM/YYYY` activity date.
pub fn parse_activity_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), ACTIVITY_DATE_FORMAT).ok()
}

// --- Resolution ---

/// Normalized identifiers of everyone with activity inside `window`.
///
/// For a month window, entries whose date is missing, unparseable or outside
/// the month are ignored entirely.
pub fn participant_identifiers(activity: &[Record], window: WindowSelector) -> HashSet<NormalizedId> {
    let mut ids = HashSet::new();
    let mut skipped_dates = 0usize;

    for entry in activity {
        if let WindowSelector::Month { .. } = window {
            match entry.get(ACTIVITY_DATE).and_then(parse_activity_date) {
                Some(date) if window.contains(date) => {}
                Some(_) => continue,
                None => {
                    skipped_dates += 1;
                    continue;
                }
            }
        }
        if let Some(id) = record_identifier(entry) {
            ids.insert(id);
        }
    }

    if skipped_dates > 0 {
        debug!(
            "{} activity entries ignored for window {}: missing or unparseable date",
            skipped_dates, window
        );
    }
    info!(
        "Found {} participants among {} activity entries for window {}",
        ids.len(),
        activity.len(),
        window
    );
    ids
}

/// Master employees whose identifier is not among `participant_ids`, in input order.
///
/// Rows without an identifier are left out: nothing can prove they did not participate.
pub fn resolve_non_participants(
    master: &[Record],
    participant_ids: &HashSet<NormalizedId>,
) -> Vec<Record> {
    let mut without_code = 0usize;
    let non_participants: Vec<Record> = master
        .iter()
        .filter(|employee| match record_identifier(employee) {
            Some(id) => !participant_ids.contains(&id),
            None => {
                without_code += 1;
                false
            }
        })
        .cloned()
        .collect();

    if without_code > 0 {
        debug!("{} master rows skipped: empty {}", without_code, EMPLOYEE_CODE);
    }
    info!(
        "{} of {} master employees did not participate",
        non_participants.len(),
        master.len()
    );
    non_participants
}
