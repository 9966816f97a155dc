// src/csv_client.rs

use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;

pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

// --- Fetch Error Type ---
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request failed: Status={status:?}, Message='{message}'")]
    Http {
        status: Option<StatusCode>,
        message: String,
    },

    #[error("Invalid source URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("HTTP client could not be built")]
    ClientBuild(#[source] reqwest::Error),
}

impl FetchError {
    /// HTTP status of the failed response, when one was received.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            FetchError::Http { status, .. } => *status,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        FetchError::Http {
            status: e.status(),
            message: e.to_string(),
        }
    }
}

/// Plain-text HTTP fetcher for published spreadsheet CSVs.
#[derive(Clone, Debug)]
pub struct CsvSourceClient {
    http_client: Client,
}

impl CsvSourceClient {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(FetchError::ClientBuild)?;
        Ok(Self { http_client })
    }

    /// GETs `url` and returns the body as text. No retry.
    pub async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        let parsed = Url::parse(url).map_err(|source| FetchError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;

        info!("Attempting to fetch CSV from: {}", parsed);
        let resp = match self.http_client.get(parsed.clone()).send().await {
            Ok(resp) => resp,
            Err(e) => {
                // network, DNS, timeout
                error!(
                    "HTTP execution failed before receiving response (URL: {}): {}",
                    parsed, e
                );
                return Err(e.into());
            }
        };

        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .await
                .unwrap_or_else(|e| format!("Failed to read error body: {}", e));
            error!(
                "CSV source returned an error: Status={}, Body='{}' for URL: {}",
                status, body, parsed
            );
            return Err(FetchError::Http {
                status: Some(status),
                message: format!("HTTP error! status: {} from {}", status.as_u16(), parsed),
            });
        }

        let bytes = resp.bytes().await.map_err(|e| {
            error!("Failed to read response body bytes (URL: {}): {}", parsed, e);
            FetchError::from(e)
        })?;

        let text = match String::from_utf8(bytes.to_vec()) {
            Ok(text) => text,
            Err(e) => {
                warn!(
                    "Response body from {} is not valid UTF-8 ({}), decoding lossily",
                    parsed,
                    e.utf8_error()
                );
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            }
        };

        info!("CSV fetched successfully. Data length: {}", text.len());
        debug!("Raw CSV body from {}: {}", parsed, text);
        Ok(text)
    }
}

#[cfg(test)]
pub(crate) mod test_server {
    use axum::{http::StatusCode, routing::get, Router};
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Serves `body` with `status` at `/data.csv` on an ephemeral local port.
    pub async fn serve(status: StatusCode, body: &'static str) -> SocketAddr {
        let app = Router::new().route("/data.csv", get(move || async move { (status, body) }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    /// Answers the n-th request with `responses[n]` after its delay; the last entry repeats.
    pub async fn serve_sequence(responses: Vec<(StatusCode, &'static str, Duration)>) -> SocketAddr {
        let responses = Arc::new(responses);
        let hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new().route(
            "/data.csv",
            get(move || {
                let hits = hits.clone();
                let responses = responses.clone();
                async move {
                    let n = hits.fetch_add(1, Ordering::SeqCst).min(responses.len() - 1);
                    let (status, body, delay) = responses[n];
                    tokio::time::sleep(delay).await;
                    (status, body)
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    pub fn url(addr: SocketAddr) -> String {
        format!("http://{}/data.csv", addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode as AxumStatusCode;
    use tokio::runtime::Runtime;

    fn create_test_client() -> CsvSourceClient {
        CsvSourceClient::new(Duration::from_secs(5)).expect("Failed to create test client")
    }

    #[test]
    fn test_fetch_text_success() {
        let rt = Runtime::new().unwrap();
        let client = create_test_client();

        let result = rt.block_on(async {
            let addr = test_server::serve(AxumStatusCode::OK, "A,B\n1,2\n").await;
            client.fetch_text(&test_server::url(addr)).await
        });

        assert_eq!(result.unwrap(), "A,B\n1,2\n");
    }

    #[test]
    fn test_fetch_text_non_success_status() {
        let rt = Runtime::new().unwrap();
        let client = create_test_client();

        let result = rt.block_on(async {
            let addr = test_server::serve(AxumStatusCode::NOT_FOUND, "gone").await;
            client.fetch_text(&test_server::url(addr)).await
        });

        match result {
            Err(e @ FetchError::Http { .. }) => {
                assert_eq!(e.status(), Some(StatusCode::NOT_FOUND));
                assert!(e.to_string().contains("404"));
            }
            other => panic!("Expected Http error but got: {:?}", other),
        }
    }

    #[test]
    fn test_fetch_text_invalid_url() {
        let rt = Runtime::new().unwrap();
        let client = create_test_client();

        let result = rt.block_on(async { client.fetch_text("not a url").await });

        assert!(matches!(result, Err(FetchError::InvalidUrl { .. })));
    }

    #[test]
    fn test_fetch_text_connection_refused() {
        let rt = Runtime::new().unwrap();
        let client = create_test_client();

        let result = rt.block_on(async {
            // Bind and drop to get a port nobody listens on
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            drop(listener);
            client.fetch_text(&test_server::url(addr)).await
        });

        match result {
            Err(e @ FetchError::Http { .. }) => assert_eq!(e.status(), None),
            other => panic!("Expected Http error but got: {:?}", other),
        }
    }
}
