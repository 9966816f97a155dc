// src/csv_decode.rs

use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};

// --- Record ---

/// One parsed row: column name -> cell value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Record {
    fields: HashMap<String, String>,
}

impl Record {
    /// Builds a record from (column, value) pairs. A repeated column keeps the last value.
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut fields = HashMap::new();
        for (key, value) in pairs {
            fields.insert(key.into(), value.into());
        }
        Self { fields }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }

    /// Cell value, or "" when the column is unset.
    pub fn value(&self, column: &str) -> &str {
        self.get(column).unwrap_or("")
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.fields.contains_key(column)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// --- Diagnostics ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    FieldCountMismatch { expected: usize, actual: usize },
    AllFieldsEmpty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedRow {
    /// 1-based position among the retained (non-blank) lines, header included.
    pub line_number: usize,
    pub reason: DropReason,
}

#[derive(Debug, Clone, Default)]
pub struct Decoded {
    pub headers: Vec<String>,
    pub records: Vec<Record>,
    pub dropped: Vec<DroppedRow>,
}

// --- Decoding ---

/// Splits one line into trimmed fields.
///
/// A `"` toggles quoted mode and is never kept, so doubled quotes inside a
/// quoted field are not un-escaped: `"a""b"` yields `ab`.
pub fn split_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut in_quotes = false;
    let mut current = String::new();

    for c in line.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    fields.push(current.trim().to_string());
    fields
}

/// Decodes CSV text into records keyed by the header line.
pub fn decode(text: &str) -> Vec<Record> {
    decode_with_diagnostics(text).records
}

/// Same as [`decode`], but also reports which rows were dropped and why.
pub fn decode_with_diagnostics(text: &str) -> Decoded {
    let mut lines = text
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter(|line| !line.trim().is_empty());

    let Some(header_line) = lines.next() else {
        debug!("CSV input has no non-blank lines");
        return Decoded::default();
    };

    let headers = split_line(header_line);
    let mut decoded = Decoded {
        headers,
        ..Decoded::default()
    };

    for (idx, line) in lines.enumerate() {
        // header is line 1
        let line_number = idx + 2;
        let values = split_line(line);

        if values.iter().all(|v| v.is_empty()) {
            debug!("Skipping empty row {}", line_number);
            decoded.dropped.push(DroppedRow {
                line_number,
                reason: DropReason::AllFieldsEmpty,
            });
            continue;
        }

        if values.len() != decoded.headers.len() {
            warn!(
                "Skipping malformed row {}: expected {} columns, got {}. Line: {:?}",
                line_number,
                decoded.headers.len(),
                values.len(),
                line
            );
            decoded.dropped.push(DroppedRow {
                line_number,
                reason: DropReason::FieldCountMismatch {
                    expected: decoded.headers.len(),
                    actual: values.len(),
                },
            });
            continue;
        }

        decoded.records.push(Record::from_pairs(
            decoded.headers.iter().cloned().zip(values),
        ));
    }

    debug!(
        "Decoded {} records ({} rows dropped)",
        decoded.records.len(),
        decoded.dropped.len()
    );
    decoded
}
