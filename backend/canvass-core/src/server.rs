// src/server.rs

use axum::http::{header, StatusCode as AxumStatusCode};
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::activity::ActivitySource;
use crate::participation::{WindowParseError, WindowSelector};
use crate::report::{ExportError, NonParticipant, EXPORT_FILE_NAME};
use crate::report_service::{ReportError, ReportOutcome, ReportService, ReportStatus};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Report generation failed: {0}")]
    Report(#[from] ReportError),
    #[error("Invalid report window: {0}")]
    InvalidWindow(#[from] WindowParseError),
    #[error("CSV export failed: {0}")]
    Export(#[from] ExportError),
}

/// Body returned for every error: the message plus an empty table, never partial rows.
#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
    rows: Vec<NonParticipant>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!("Error occurred: {:?}", self);
        let (status_code, message) = match &self {
            AppError::Report(report_err) => {
                let status = match report_err {
                    ReportError::Network(_)
                    | ReportError::ActivityNetwork(_)
                    | ReportError::EmptyData => {
                        AxumStatusCode::BAD_GATEWAY
                    }
                    ReportError::MissingActivityData(_) => AxumStatusCode::SERVICE_UNAVAILABLE,
                    ReportError::Superseded { .. } => AxumStatusCode::CONFLICT,
                };
                (status, report_err.user_message())
            }
            AppError::InvalidWindow(e) => (AxumStatusCode::BAD_REQUEST, e.to_string()),
            AppError::Export(_) => (
                AxumStatusCode::INTERNAL_SERVER_ERROR,
                "Failed to build the CSV download.".to_string(),
            ),
        };

        (
            status_code,
            Json(ErrorBody {
                message,
                rows: Vec::new(),
            }),
        )
            .into_response()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub report_service: Arc<ReportService>,
    pub activity: Arc<dyn ActivitySource>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Json,
    Csv,
}

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub window: Option<String>,
    #[serde(default)]
    pub format: ReportFormat,
}

#[derive(Debug, Serialize)]
struct ReportResponse {
    window: String,
    full_participation: bool,
    message: String,
    count: usize,
    rows: Vec<NonParticipant>,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    service: &'static str,
    version: &'static str,
    report_status: ReportStatus,
    master_employees: usize,
}

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new().route("/reports/non-participants", get(handle_non_participants));
    Router::new()
        .nest("/api", api_routes)
        .route("/status", get(handle_status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        report_status: state.report_service.status().await,
        master_employees: state.report_service.master_snapshot().await.len(),
    })
}

async fn handle_non_participants(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<Response, AppError> {
    let window: WindowSelector = match query.window.as_deref() {
        Some(raw) => raw.parse()?,
        None => WindowSelector::AllTime,
    };
    info!(
        "Handling /api/reports/non-participants (window={}, format={:?})...",
        window, query.format
    );

    let outcome = state
        .report_service
        .generate(state.activity.as_ref(), window)
        .await?;
    let message = outcome.user_message();
    let full_participation = matches!(outcome, ReportOutcome::FullParticipation { .. });
    if full_participation {
        warn!("{}", message);
    }
    let report = outcome.into_report();

    match query.format {
        ReportFormat::Json => Ok(Json(ReportResponse {
            window: report.window.to_string(),
            full_participation,
            message,
            count: report.len(),
            rows: report.rows,
        })
        .into_response()),
        ReportFormat::Csv => {
            let body = report.to_csv()?;
            Ok((
                [
                    (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{}\"", EXPORT_FILE_NAME),
                    ),
                ],
                body,
            )
                .into_response())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::InMemoryActivity;
    use crate::csv_client::{test_server, CsvSourceClient};
    use crate::csv_decode::Record;
    use crate::participation::{ACTIVITY_DATE, EMPLOYEE_CODE};
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::Value as JSValue;
    use std::time::Duration;
    use tokio::runtime::Runtime;
    use tower::ServiceExt;

    const MASTER_CSV: &str = "Employee Code,Employee Name,Division,Designation\n\
                              E1,Ann,North,Officer\n\
                              E2,Bob,South,Clerk\n";

    fn create_test_state(master_url: String, entries: Vec<Record>) -> AppState {
        let client = CsvSourceClient::new(Duration::from_secs(5)).unwrap();
        AppState {
            report_service: Arc::new(ReportService::new(client, master_url)),
            activity: Arc::new(InMemoryActivity::new(entries)),
        }
    }

    fn july_activity() -> Vec<Record> {
        vec![Record::from_pairs([
            (EMPLOYEE_CODE, "E1"),
            (ACTIVITY_DATE, "05/07/2025"),
        ])]
    }

    async fn call(app: Router, uri: &str) -> (AxumStatusCode, Option<String>, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let disposition = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, disposition, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[test]
    fn test_report_json() {
        let rt = Runtime::new().unwrap();

        let (status, _, body) = rt.block_on(async {
            let addr = test_server::serve(AxumStatusCode::OK, MASTER_CSV).await;
            let app = router(create_test_state(test_server::url(addr), july_activity()));
            call(app, "/api/reports/non-participants?window=07-2025").await
        });

        assert_eq!(status, AxumStatusCode::OK);
        let js: JSValue = serde_json::from_str(&body).unwrap();
        assert_eq!(js["window"], "07-2025");
        assert_eq!(js["count"], 1);
        assert_eq!(js["full_participation"], false);
        assert_eq!(js["rows"][0]["Employee Code"], "E2");
    }

    #[test]
    fn test_report_csv_download() {
        let rt = Runtime::new().unwrap();

        let (status, disposition, body) = rt.block_on(async {
            let addr = test_server::serve(AxumStatusCode::OK, MASTER_CSV).await;
            let app = router(create_test_state(test_server::url(addr), july_activity()));
            call(app, "/api/reports/non-participants?window=08-2025&format=csv").await
        });

        assert_eq!(status, AxumStatusCode::OK);
        assert_eq!(
            disposition.as_deref(),
            Some("attachment; filename=\"non_participating_employees.csv\"")
        );
        assert_eq!(
            body,
            "SL.No.,Employee Code,Employee Name,Division,Designation\n\
             \"1\",\"E1\",\"Ann\",\"North\",\"Officer\"\n\
             \"2\",\"E2\",\"Bob\",\"South\",\"Clerk\""
        );
    }

    #[test]
    fn test_report_master_fetch_failure() {
        let rt = Runtime::new().unwrap();

        let (status, _, body) = rt.block_on(async {
            let addr = test_server::serve(AxumStatusCode::NOT_FOUND, "missing").await;
            let app = router(create_test_state(test_server::url(addr), july_activity()));
            call(app, "/api/reports/non-participants").await
        });

        assert_eq!(status, AxumStatusCode::BAD_GATEWAY);
        let js: JSValue = serde_json::from_str(&body).unwrap();
        assert!(js["message"]
            .as_str()
            .unwrap()
            .starts_with("Failed to load data"));
        assert_eq!(js["rows"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn test_report_missing_activity() {
        let rt = Runtime::new().unwrap();

        let (status, _, body) = rt.block_on(async {
            let addr = test_server::serve(AxumStatusCode::OK, MASTER_CSV).await;
            let app = router(create_test_state(test_server::url(addr), Vec::new()));
            call(app, "/api/reports/non-participants?window=all").await
        });

        assert_eq!(status, AxumStatusCode::SERVICE_UNAVAILABLE);
        let js: JSValue = serde_json::from_str(&body).unwrap();
        assert_eq!(
            js["message"],
            "No canvassing activity data available. Cannot generate report."
        );
    }

    #[test]
    fn test_report_invalid_window() {
        let rt = Runtime::new().unwrap();

        let (status, _, _) = rt.block_on(async {
            let app = router(create_test_state(
                "http://127.0.0.1:9/unused.csv".to_string(),
                july_activity(),
            ));
            call(app, "/api/reports/non-participants?window=July").await
        });

        assert_eq!(status, AxumStatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_status_endpoint() {
        let rt = Runtime::new().unwrap();

        let (status, _, body) = rt.block_on(async {
            let app = router(create_test_state(
                "http://127.0.0.1:9/unused.csv".to_string(),
                july_activity(),
            ));
            call(app, "/status").await
        });

        assert_eq!(status, AxumStatusCode::OK);
        let js: JSValue = serde_json::from_str(&body).unwrap();
        assert_eq!(js["report_status"], "idle");
        assert_eq!(js["master_employees"], 0);
    }
}
