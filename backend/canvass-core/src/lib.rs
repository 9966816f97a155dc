// src/lib.rs

pub mod activity;
pub mod config;
pub mod csv_client;
pub mod csv_decode;
pub mod participation;
pub mod report;
pub mod report_service;
pub mod server;


pub use activity::{ActivitySource, CsvFileActivity, CsvUrlActivity, InMemoryActivity};
pub use config::Config;
pub use csv_client::{CsvSourceClient, FetchError};
pub use csv_decode::{decode, Record};
pub use participation::{participant_identifiers, resolve_non_participants, WindowSelector};
pub use report::NonParticipantReport;
pub use report_service::{ReportError, ReportOutcome, ReportService, ReportStatus};
