// src/config.rs

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::csv_client::DEFAULT_HTTP_TIMEOUT_SECS;

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    3000
}

fn default_http_timeout_secs() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    // Published master employee sheet (CSV output); `--master-url` can stand in for it
    pub master_csv_url: Option<String>,

    // Canvassing activity data; the path wins when both are set
    pub activity_csv_url: Option<String>,
    pub activity_csv_path: Option<PathBuf>,

    // Server Configuration
    #[serde(default = "default_server_host")]
    pub server_host: String,
    #[serde(default = "default_server_port")]
    pub server_port: u16,

    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    // TLS (optional, both required)
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, envy::Error> {
        // Load .env file if it exists
        dotenv::dotenv().ok();

        // Parse environment variables into Config struct
        envy::from_env::<Config>()
    }

    /// Master CSV URL: the override when given, else `MASTER_CSV_URL`.
    pub fn master_url(&self, override_url: Option<String>) -> Option<String> {
        override_url
            .or_else(|| self.master_csv_url.clone())
            .filter(|url| !url.trim().is_empty())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn server_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.server_host, self.server_port).parse()
    }

    /// Certificate and key paths, when HTTPS is configured.
    pub fn tls_paths(&self) -> Option<(&str, &str)> {
        match (&self.cert_path, &self.key_path) {
            (Some(cert), Some(key)) => Some((cert.as_str(), key.as_str())),
            _ => None,
        }
    }
}
