// src/main.rs
use anyhow::{anyhow, Context, Result};
use axum_server::tls_rustls::RustlsConfig;
use clap::{Args, Parser, Subcommand};
use std::{path::PathBuf, sync::Arc};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use canvass_core::server::{router, AppState};
use canvass_core::{
    ActivitySource, Config, CsvFileActivity, CsvSourceClient, CsvUrlActivity, InMemoryActivity,
    ReportService, WindowSelector,
};

/// Reports master employees without canvassing activity.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate the non-participants report once and print it.
    Report(ReportArgs),
    /// Serve the report over HTTP.
    Serve,
}

#[derive(Args, Debug)]
struct ReportArgs {
    /// 'all' or MM-YYYY
    #[arg(short, long, default_value = "all")]
    window: WindowSelector,

    /// Local activity CSV (overrides ACTIVITY_CSV_PATH / ACTIVITY_CSV_URL)
    #[arg(long, conflicts_with = "activity_url")]
    activity_file: Option<PathBuf>,

    /// Remote activity CSV (overrides ACTIVITY_CSV_PATH / ACTIVITY_CSV_URL)
    #[arg(long)]
    activity_url: Option<String>,

    /// Master employee CSV URL (overrides MASTER_CSV_URL)
    #[arg(long)]
    master_url: Option<String>,

    /// Write the CSV export to this file
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let filter = EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Setting tracing subscriber failed")?;

    let cli = Cli::parse();
    let config = Config::from_env().context("Loading configuration from environment failed")?;
    info!("Configuration loaded.");

    let client = CsvSourceClient::new(config.http_timeout())?;

    match cli.command {
        Command::Report(args) => run_report(config, client, args).await,
        Command::Serve => serve(config, client).await,
    }
}

fn activity_source(
    config: &Config,
    client: &CsvSourceClient,
    file: Option<PathBuf>,
    url: Option<String>,
) -> Arc<dyn ActivitySource> {
    // Command line first, then environment; a path beats a URL at each level
    let (file, url) = if file.is_some() || url.is_some() {
        (file, url)
    } else {
        (config.activity_csv_path.clone(), config.activity_csv_url.clone())
    };
    if let Some(path) = file {
        return Arc::new(CsvFileActivity::new(path));
    }
    if let Some(url) = url {
        return Arc::new(CsvUrlActivity::new(client.clone(), url));
    }
    warn!("No activity source configured; reports will have no activity data.");
    Arc::new(InMemoryActivity::default())
}

async fn run_report(config: Config, client: CsvSourceClient, args: ReportArgs) -> Result<()> {
    let activity = activity_source(&config, &client, args.activity_file, args.activity_url);
    let master_url = config
        .master_url(args.master_url)
        .context("MASTER_CSV_URL is not set and --master-url was not given")?;
    let service = ReportService::new(client, master_url);

    let outcome = match service.generate(activity.as_ref(), args.window).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Report generation failed: {}", e);
            return Err(anyhow!(e.user_message()));
        }
    };

    println!("{}", outcome.user_message());
    let report = outcome.into_report();
    if !report.is_empty() {
        println!("{}", report.render_table());
    }

    if let Some(path) = args.out {
        let csv = report.to_csv()?;
        tokio::fs::write(&path, csv)
            .await
            .with_context(|| format!("Writing report to {:?} failed", path))?;
        info!("Report written to {:?}", path);
    }
    Ok(())
}

async fn serve(config: Config, client: CsvSourceClient) -> Result<()> {
    let activity = activity_source(&config, &client, None, None);
    let master_url = config
        .master_url(None)
        .context("MASTER_CSV_URL must be set to serve reports")?;
    let report_service = Arc::new(ReportService::new(client, master_url));
    let app = router(AppState {
        report_service,
        activity,
    });

    let addr = config.server_addr().context("Invalid SERVER_HOST/SERVER_PORT")?;
    match config.tls_paths() {
        Some((cert, key)) => {
            let tls_config = RustlsConfig::from_pem_file(cert, key)
                .await
                .context("Failed to load TLS cert/key")?;
            info!("Starting server on https://{}", addr);
            axum_server::bind_rustls(addr, tls_config)
                .serve(app.into_make_service())
                .await
                .context("HTTPS server failed")?;
        }
        None => {
            info!("Starting server on http://{}", addr);
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("Binding {} failed", addr))?;
            axum::serve(listener, app).await.context("HTTP server failed")?;
        }
    }
    Ok(())
}
