// src/main.rs

use reqwest::Client;
use serde::Deserialize;
use std::env;
use std::error::Error;

// Response types
#[derive(Debug, Deserialize)]
struct StatusResponse {
    service: String,
    version: String,
    report_status: String,
    master_employees: usize,
}

#[derive(Debug, Deserialize)]
struct ReportRow {
    #[serde(rename = "Employee Code")]
    employee_code: String,
    #[serde(rename = "Employee Name")]
    employee_name: String,
}

#[derive(Debug, Deserialize)]
struct ReportResponse {
    window: String,
    full_participation: bool,
    message: String,
    count: usize,
    rows: Vec<ReportRow>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    message: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let base_url = env::var("CANVASS_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
    let window = env::args().nth(1).unwrap_or_else(|| "all".to_string());
    let client = Client::new();

    // Test 1: Status
    println!("\n🔍 Testing status endpoint...");
    let status = client
        .get(format!("{}/status", base_url))
        .send()
        .await?
        .json::<StatusResponse>()
        .await?;
    println!(
        "{} v{}: last report {}, {} master employees cached",
        status.service, status.version, status.report_status, status.master_employees
    );

    // Test 2: JSON report
    println!("\n🔍 Testing JSON report for window '{}'...", window);
    let response = client
        .get(format!("{}/api/reports/non-participants", base_url))
        .query(&[("window", window.as_str())])
        .send()
        .await?;
    let http_status = response.status();
    if http_status.is_success() {
        let report = response.json::<ReportResponse>().await?;
        println!(
            "Window {}: {} (count={}, full participation={})",
            report.window, report.message, report.count, report.full_participation
        );
        for row in report.rows.iter().take(10) {
            println!("  {} - {}", row.employee_code, row.employee_name);
        }
    } else {
        let err = response.json::<ErrorResponse>().await?;
        println!("Report failed with status {}: {}", http_status, err.message);
    }

    // Test 3: CSV download
    println!("\n🔍 Testing CSV download...");
    let csv_response = client
        .get(format!("{}/api/reports/non-participants", base_url))
        .query(&[("window", window.as_str()), ("format", "csv")])
        .send()
        .await?;
    println!("CSV download status: {}", csv_response.status());
    if let Some(disposition) = csv_response.headers().get(reqwest::header::CONTENT_DISPOSITION) {
        println!("Content-Disposition: {:?}", disposition);
    }
    let body = csv_response.text().await?;
    println!("CSV body ({} lines):", body.lines().count());
    for line in body.lines().take(5) {
        println!("  {}", line);
    }

    println!("\n✅ All tests completed!");
    Ok(())
}
