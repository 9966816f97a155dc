// src/activity.rs

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{error, info};

use crate::csv_client::CsvSourceClient;
use crate::csv_decode::{decode, Record};
use crate::report_service::ReportError;

/// Supplies the canvassing activity data set for one report invocation.
#[async_trait]
pub trait ActivitySource: Send + Sync {
    /// Fully materialized activity entries.
    async fn load(&self) -> Result<Vec<Record>, ReportError>;

    fn describe(&self) -> String;
}

/// Activity data handed over by another component.
#[derive(Debug, Clone, Default)]
pub struct InMemoryActivity {
    entries: Vec<Record>,
}

impl InMemoryActivity {
    pub fn new(entries: Vec<Record>) -> Self {
        Self { entries }
    }
}

#[async_trait]
impl ActivitySource for InMemoryActivity {
    async fn load(&self) -> Result<Vec<Record>, ReportError> {
        Ok(self.entries.clone())
    }

    fn describe(&self) -> String {
        format!("memory ({} entries)", self.entries.len())
    }
}

#[derive(Debug, Clone)]
pub struct CsvFileActivity {
    path: PathBuf,
}

impl CsvFileActivity {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ActivitySource for CsvFileActivity {
    async fn load(&self) -> Result<Vec<Record>, ReportError> {
        let text = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            error!("Failed to read activity file {:?}: {}", self.path, e);
            ReportError::MissingActivityData(format!(
                "failed to read activity file {:?}: {}",
                self.path, e
            ))
        })?;
        let entries = decode(&text);
        info!("Loaded {} activity entries from {:?}", entries.len(), self.path);
        Ok(entries)
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}

#[derive(Debug, Clone)]
pub struct CsvUrlActivity {
    client: CsvSourceClient,
    url: String,
}

impl CsvUrlActivity {
    pub fn new(client: CsvSourceClient, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl ActivitySource for CsvUrlActivity {
    async fn load(&self) -> Result<Vec<Record>, ReportError> {
        let text = self.client.fetch_text(&self.url).await.map_err(|e| {
            error!("Failed to load activity data from {}: {}", self.url, e);
            ReportError::ActivityNetwork(e)
        })?;
        let entries = decode(&text);
        info!("Loaded {} activity entries from {}", entries.len(), self.url);
        Ok(entries)
    }

    fn describe(&self) -> String {
        format!("url {}", self.url)
    }
}
