// src/report_service.rs

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::activity::ActivitySource;
use crate::csv_client::{CsvSourceClient, FetchError};
use crate::csv_decode::{decode_with_diagnostics, Record};
use crate::participation::{
    participant_identifiers, record_identifier, resolve_non_participants, WindowSelector,
    EMPLOYEE_CODE,
};
use crate::report::NonParticipantReport;

// --- Report Errors ---

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to load master employee data")]
    Network(#[source] FetchError),

    #[error("Failed to load canvassing activity data")]
    ActivityNetwork(#[source] FetchError),

    #[error("Master employee data contained no usable rows")]
    EmptyData,

    #[error("Canvassing activity data unavailable: {0}")]
    MissingActivityData(String),

    #[error("Report request {token} was superseded by a newer request")]
    Superseded { token: u64 },
}

impl ReportError {
    /// Message shown to the person who asked for the report.
    pub fn user_message(&self) -> String {
        match self {
            ReportError::Network(e) => format!(
                "Failed to load data: {}. Please check the logs for details.",
                e
            ),
            ReportError::ActivityNetwork(e) => format!(
                "Failed to load canvassing activity data: {}. Please check the logs for details.",
                e
            ),
            ReportError::EmptyData => {
                "Master Employee data not loaded. Cannot generate report.".to_string()
            }
            ReportError::MissingActivityData(_) => {
                "No canvassing activity data available. Cannot generate report.".to_string()
            }
            ReportError::Superseded { .. } => {
                "A newer report request replaced this one.".to_string()
            }
        }
    }
}

// --- Outcome & Status ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    NonParticipants(NonParticipantReport),
    /// Nobody is missing for the window. Not an error.
    FullParticipation { window: WindowSelector },
}

impl ReportOutcome {
    pub fn window(&self) -> WindowSelector {
        match self {
            ReportOutcome::NonParticipants(report) => report.window,
            ReportOutcome::FullParticipation { window } => *window,
        }
    }

    /// The report; empty for full participation.
    pub fn into_report(self) -> NonParticipantReport {
        match self {
            ReportOutcome::NonParticipants(report) => report,
            ReportOutcome::FullParticipation { window } => NonParticipantReport::new(window, &[]),
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            ReportOutcome::NonParticipants(report) => format!(
                "{} employees have not participated in activities ({}).",
                report.len(),
                report.window
            ),
            ReportOutcome::FullParticipation { .. } => {
                "All employees have participated in activities based on current data!".to_string()
            }
        }
    }
}

/// Progress of the most recent report invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Idle,
    FetchingMaster,
    FetchFailed,
    MasterLoaded,
    Resolving,
    Resolved,
}

pub type ResetHook = Arc<dyn Fn() + Send + Sync>;

// --- Report Service ---

pub struct ReportService {
    client: CsvSourceClient,
    master_url: String,
    master: Mutex<Arc<Vec<Record>>>,
    status: Mutex<ReportStatus>,
    latest_token: AtomicU64,
    reset_hook: Option<ResetHook>,
}

impl ReportService {
    pub fn new(client: CsvSourceClient, master_url: impl Into<String>) -> Self {
        Self {
            client,
            master_url: master_url.into(),
            master: Mutex::new(Arc::new(Vec::new())),
            status: Mutex::new(ReportStatus::Idle),
            latest_token: AtomicU64::new(0),
            reset_hook: None,
        }
    }

    /// Hook run at the start of every invocation, before anything is fetched.
    pub fn with_reset_hook(mut self, hook: ResetHook) -> Self {
        self.reset_hook = Some(hook);
        self
    }

    pub fn master_url(&self) -> &str {
        &self.master_url
    }

    pub async fn status(&self) -> ReportStatus {
        *self.status.lock().await
    }

    /// The master list of the last successful fetch (empty after a failed one).
    pub async fn master_snapshot(&self) -> Arc<Vec<Record>> {
        self.master.lock().await.clone()
    }

    fn is_current(&self, token: u64) -> bool {
        self.latest_token.load(Ordering::SeqCst) == token
    }

    fn ensure_current(&self, token: u64) -> Result<(), ReportError> {
        if self.is_current(token) {
            Ok(())
        } else {
            warn!("Discarding stale report request {}", token);
            Err(ReportError::Superseded { token })
        }
    }

    async fn set_status(&self, token: u64, next: ReportStatus) {
        let mut status = self.status.lock().await;
        if self.is_current(token) {
            debug!("Report request {}: {:?} -> {:?}", token, *status, next);
            *status = next;
        }
    }

    /// Clears the snapshot so a failed fetch never leaves stale or partial rows behind.
    async fn fail_master(&self, token: u64) {
        let mut master = self.master.lock().await;
        if self.is_current(token) {
            *master = Arc::new(Vec::new());
        }
        drop(master);
        self.set_status(token, ReportStatus::FetchFailed).await;
    }

    async fn load_master(&self, token: u64) -> Result<Arc<Vec<Record>>, ReportError> {
        self.set_status(token, ReportStatus::FetchingMaster).await;
        info!("Loading master employee data...");

        let fetched = self.client.fetch_text(&self.master_url).await;
        self.ensure_current(token)?;

        let text = match fetched {
            Ok(text) => text,
            Err(e) => {
                error!("Failed to load master employee data: {}", e);
                self.fail_master(token).await;
                return Err(ReportError::Network(e));
            }
        };

        let decoded = decode_with_diagnostics(&text);
        if !decoded.dropped.is_empty() {
            warn!(
                "{} master rows were dropped while decoding",
                decoded.dropped.len()
            );
        }
        if decoded.records.is_empty() {
            error!("Master employee CSV yielded no usable rows");
            self.fail_master(token).await;
            return Err(ReportError::EmptyData);
        }
        if !decoded.records.iter().any(|r| record_identifier(r).is_some()) {
            error!(
                "Master employee CSV has no row with a '{}' value (headers: {:?})",
                EMPLOYEE_CODE, decoded.headers
            );
            self.fail_master(token).await;
            return Err(ReportError::EmptyData);
        }

        let snapshot = Arc::new(decoded.records);
        {
            let mut master = self.master.lock().await;
            self.ensure_current(token)?;
            *master = snapshot.clone();
        }
        self.set_status(token, ReportStatus::MasterLoaded).await;
        info!("Master employee data loaded: {} employees", snapshot.len());
        Ok(snapshot)
    }

    /// Runs one report invocation from `Idle` to `Resolved`.
    pub async fn generate(
        &self,
        activity: &dyn ActivitySource,
        window: WindowSelector,
    ) -> Result<ReportOutcome, ReportError> {
        let token = self.latest_token.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(hook) = &self.reset_hook {
            hook();
        }
        self.set_status(token, ReportStatus::Idle).await;
        info!(
            "Report request {}: window {}, activity from {}",
            token,
            window,
            activity.describe()
        );

        let master = self.load_master(token).await?;

        let entries = activity.load().await?;
        self.ensure_current(token)?;
        validate_activity(&entries)?;

        self.set_status(token, ReportStatus::Resolving).await;
        let participants = participant_identifiers(&entries, window);
        let non_participants = resolve_non_participants(&master, &participants);
        self.set_status(token, ReportStatus::Resolved).await;

        if non_participants.is_empty() {
            info!("Report request {}: full participation", token);
            Ok(ReportOutcome::FullParticipation { window })
        } else {
            Ok(ReportOutcome::NonParticipants(NonParticipantReport::new(
                window,
                &non_participants,
            )))
        }
    }
}

fn validate_activity(entries: &[Record]) -> Result<(), ReportError> {
    if entries.is_empty() {
        return Err(ReportError::MissingActivityData(
            "activity data set is empty".to_string(),
        ));
    }
    if !entries.iter().any(|e| e.has_column(EMPLOYEE_CODE)) {
        return Err(ReportError::MissingActivityData(format!(
            "activity data has no '{}' column",
            EMPLOYEE_CODE
        )));
    }
    Ok(())
}
