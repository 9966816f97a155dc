// src/report.rs

use csv::{QuoteStyle, Terminator, WriterBuilder};
use serde::Serialize;
use std::string::FromUtf8Error;
use thiserror::Error;

use crate::csv_decode::Record;
use crate::participation::{WindowSelector, DESIGNATION, DIVISION, EMPLOYEE_CODE, EMPLOYEE_NAME};

pub const EXPORT_HEADER: &str = "SL.No.,Employee Code,Employee Name,Division,Designation";
pub const EXPORT_FILE_NAME: &str = "non_participating_employees.csv";

const MISSING_CELL: &str = "N/A";
const VISIT_PARTICIPATION: &str = "No";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("CSV writer error: {0}")]
    Csv(#[from] csv::Error),
    #[error("CSV buffer flush failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV output is not valid UTF-8: {0}")]
    Utf8(#[from] FromUtf8Error),
}

/// One row of the non-participants report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NonParticipant {
    #[serde(rename = "Employee Code")]
    pub employee_code: String,
    #[serde(rename = "Employee Name")]
    pub employee_name: String,
    #[serde(rename = "Division")]
    pub division: String,
    #[serde(rename = "Designation")]
    pub designation: String,
}

impl From<&Record> for NonParticipant {
    fn from(record: &Record) -> Self {
        Self {
            employee_code: record.value(EMPLOYEE_CODE).to_string(),
            employee_name: record.value(EMPLOYEE_NAME).to_string(),
            division: record.value(DIVISION).to_string(),
            designation: record.value(DESIGNATION).to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NonParticipantReport {
    pub window: WindowSelector,
    pub rows: Vec<NonParticipant>,
}

impl NonParticipantReport {
    pub fn new(window: WindowSelector, records: &[Record]) -> Self {
        Self {
            window,
            rows: records.iter().map(NonParticipant::from).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// CSV export: unquoted header, then every field quoted, `\n` between rows, no trailing newline.
    pub fn to_csv(&self) -> Result<String, ExportError> {
        let mut writer = WriterBuilder::new()
            .quote_style(QuoteStyle::Always)
            .terminator(Terminator::Any(b'\n'))
            .from_writer(Vec::new());

        for (idx, row) in self.rows.iter().enumerate() {
            let sl_no = (idx + 1).to_string();
            writer.write_record([
                sl_no.as_str(),
                row.employee_code.as_str(),
                row.employee_name.as_str(),
                row.division.as_str(),
                row.designation.as_str(),
            ])?;
        }

        let bytes = writer.into_inner().map_err(|e| e.into_error())?;
        let body = String::from_utf8(bytes)?;

        let mut out = String::from(EXPORT_HEADER);
        if let Some(rows) = body.strip_suffix('\n') {
            out.push('\n');
            out.push_str(rows);
        }
        Ok(out)
    }

    /// Fixed-width text table for terminal output.
    pub fn render_table(&self) -> String {
        let header = [
            "SL.No.",
            EMPLOYEE_CODE,
            EMPLOYEE_NAME,
            DIVISION,
            DESIGNATION,
            "Visit Participation",
        ];
        let body: Vec<[String; 6]> = self
            .rows
            .iter()
            .enumerate()
            .map(|(idx, row)| {
                [
                    (idx + 1).to_string(),
                    or_missing(&row.employee_code),
                    or_missing(&row.employee_name),
                    or_missing(&row.division),
                    or_missing(&row.designation),
                    VISIT_PARTICIPATION.to_string(),
                ]
            })
            .collect();

        let mut widths = header.map(|h| h.chars().count());
        for cells in &body {
            for (width, cell) in widths.iter_mut().zip(cells) {
                *width = (*width).max(cell.chars().count());
            }
        }

        let mut lines = Vec::with_capacity(body.len() + 2);
        lines.push(format_row(header.iter().copied(), &widths));
        lines.push(
            widths
                .iter()
                .map(|w| "-".repeat(*w))
                .collect::<Vec<_>>()
                .join("-+-"),
        );
        for cells in &body {
            lines.push(format_row(cells.iter().map(String::as_str), &widths));
        }
        lines.join("\n")
    }
}

fn or_missing(value: &str) -> String {
    if value.is_empty() {
        MISSING_CELL.to_string()
    } else {
        value.to_string()
    }
}

fn format_row<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    cells
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
        .collect::<Vec<_>>()
        .join(" | ")
        .trim_end()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csv_decode::decode;

    fn row(code: &str, name: &str, division: &str, designation: &str) -> Record {
        Record::from_pairs([
            (EMPLOYEE_CODE, code),
            (EMPLOYEE_NAME, name),
            (DIVISION, division),
            (DESIGNATION, designation),
        ])
    }

    fn sample_report() -> NonParticipantReport {
        NonParticipantReport::new(
            WindowSelector::AllTime,
            &[
                row("E2", "Bob", "South", "Clerk"),
                row("E3", "Doe, Jane", "North", "Branch Manager"),
            ],
        )
    }

    #[test]
    fn csv_export_format() {
        let csv = sample_report().to_csv().unwrap();
        assert_eq!(
            csv,
            "SL.No.,Employee Code,Employee Name,Division,Designation\n\
             \"1\",\"E2\",\"Bob\",\"South\",\"Clerk\"\n\
             \"2\",\"E3\",\"Doe, Jane\",\"North\",\"Branch Manager\""
        );
    }

    #[test]
    fn csv_export_doubles_inner_quotes() {
        let report = NonParticipantReport::new(
            WindowSelector::AllTime,
            &[row("E1", "Ann \"Nan\" Lee", "", "")],
        );
        let csv = report.to_csv().unwrap();
        assert!(csv.ends_with("\"1\",\"E1\",\"Ann \"\"Nan\"\" Lee\",\"\",\"\""));
    }

    #[test]
    fn csv_export_of_empty_report_is_header_only() {
        let report = NonParticipantReport::new(WindowSelector::AllTime, &[]);
        assert_eq!(report.to_csv().unwrap(), EXPORT_HEADER);
    }

    #[test]
    fn csv_export_reparses_to_same_rows() {
        let report = sample_report();
        let records = decode(&report.to_csv().unwrap());

        assert_eq!(records.len(), report.len());
        for (idx, (record, original)) in records.iter().zip(&report.rows).enumerate() {
            assert_eq!(record.value("SL.No."), (idx + 1).to_string());
            assert_eq!(&NonParticipant::from(record), original);
        }
    }

    #[test]
    fn non_participant_from_record_defaults_missing_fields() {
        let record = Record::from_pairs([(EMPLOYEE_CODE, "E7")]);
        let np = NonParticipant::from(&record);
        assert_eq!(np.employee_code, "E7");
        assert_eq!(np.employee_name, "");
        assert_eq!(np.designation, "");
    }

    #[test]
    fn render_table_aligns_columns_and_fills_missing() {
        let report = NonParticipantReport::new(
            WindowSelector::AllTime,
            &[row("E2", "Bob", "", "Clerk")],
        );
        let table = report.render_table();
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("SL.No. | Employee Code | Employee Name"));
        assert!(lines[1].starts_with("-------"));
        assert!(lines[2].contains("N/A"));
        assert!(lines[2].ends_with("| No"));
    }

    #[test]
    fn report_serializes_with_spreadsheet_column_names() {
        let js = serde_json::to_value(sample_report()).unwrap();
        assert_eq!(js["rows"][0]["Employee Code"], "E2");
        assert_eq!(js["rows"][1]["Employee Name"], "Doe, Jane");
        assert_eq!(js["window"]["kind"], "all_time");
    }
}
