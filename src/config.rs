//! Configuration loading from `.env` files.

use std::{env, path::PathBuf};

use anyhow::{Context, Result};

/// Runtime settings derived from environment variables.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Directory holding the download log and the update catalog.
    pub data_dir: PathBuf,
    /// HTTP bind address, e.g. `0.0.0.0:4000`.
    pub bind_http: String,
    /// Where `/api/download` redirects after recording the event.
    pub download_url: String,
    /// Public link advertised by `/api/latest`.
    pub download_link: String,
    /// Path of the download log document.
    pub download_log: PathBuf,
    /// Path of the update catalog document.
    pub updates_file: PathBuf,
    /// Allowed CORS origins; empty means any origin.
    pub cors_origins: Vec<String>,
    /// `tracing` filter string, e.g. `info` or `dltally=debug`.
    pub log_level: String,
    /// Emit log records as JSON lines.
    pub log_json: bool,
}

impl Settings {
    /// Load settings from the specified `.env` file.
    pub fn from_env(path: &str) -> Result<Self> {
        dotenvy::from_filename(path).context("reading env file")?;
        let data_dir = PathBuf::from(env::var("DATA_DIR").context("DATA_DIR is not set")?);
        let bind_http = env::var("BIND_HTTP").context("BIND_HTTP is not set")?;
        let download_url = env::var("DOWNLOAD_URL").context("DOWNLOAD_URL is not set")?;
        let download_link = non_empty("DOWNLOAD_LINK").unwrap_or_else(|| "/api/download".into());
        let download_log = non_empty("DOWNLOAD_LOG")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("downloads.json"));
        let updates_file = non_empty("UPDATES_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("updates.json"));
        let cors_origins = csv_strings(env::var("CORS_ORIGINS").unwrap_or_default());
        let log_level = non_empty("LOG_LEVEL").unwrap_or_else(|| "info".into());
        let log_json = env::var("LOG_JSON")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        Ok(Self {
            data_dir,
            bind_http,
            download_url,
            download_link,
            download_log,
            updates_file,
            cors_origins,
            log_level,
            log_json,
        })
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.trim().is_empty())
}

/// Split a comma-separated string into trimmed string values.
pub fn csv_strings(input: impl AsRef<str>) -> Vec<String> {
    input
        .as_ref()
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
pub(crate) static ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
pub(crate) const ENV_VARS: [&str; 9] = [
    "DATA_DIR",
    "BIND_HTTP",
    "DOWNLOAD_URL",
    "DOWNLOAD_LINK",
    "DOWNLOAD_LOG",
    "UPDATES_FILE",
    "CORS_ORIGINS",
    "LOG_LEVEL",
    "LOG_JSON",
];

#[cfg(test)]
pub(crate) fn clear_env() {
    for v in ENV_VARS.iter() {
        env::remove_var(v);
    }
}
