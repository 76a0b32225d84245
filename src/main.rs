//! Command line interface for the download tracker. Supports initializing the
//! data directory, serving the HTTP API, and printing the country summary.

mod aggregate;
mod catalog;
mod config;
mod error;
mod event;
mod paginate;
mod server;
mod storage;

use std::{
    fs,
    net::SocketAddr,
    path::Path,
};

use anyhow::Context;
use clap::{Parser, Subcommand};
use config::Settings;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::{catalog::UpdateCatalog, server::AppState, storage::EventStore};

/// Command line interface entry point.
#[derive(Parser)]
#[command(
    name = "dltally",
    author,
    version,
    about = "File-backed download tracker and release-notes feed"
)]
struct Cli {
    /// Path to the `.env` configuration file.
    #[arg(long, default_value = ".env")]
    env: String,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Create the data directory with an empty download log and catalog.
    Init,
    /// Serve the HTTP API until interrupted.
    Serve,
    /// Print downloads per country as JSON.
    Summary,
}

/// Execute the selected CLI subcommand.
async fn run(cli: Cli) -> anyhow::Result<()> {
    ensure_env_file(&cli.env)?;
    let cfg = Settings::from_env(&cli.env)?;
    let events = EventStore::new(cfg.download_log.clone());
    let catalog = UpdateCatalog::new(cfg.updates_file.clone());
    match cli.command {
        Commands::Init => {
            fs::create_dir_all(&cfg.data_dir)
                .with_context(|| format!("creating {}", cfg.data_dir.display()))?;
            events.init()?;
            if !catalog.path().exists() {
                if let Some(parent) = catalog.path().parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(catalog.path(), "[]\n")
                    .with_context(|| format!("writing {}", catalog.path().display()))?;
            }
            info!(
                data_dir = %cfg.data_dir.display(),
                log = %events.path().display(),
                "data directory ready"
            );
        }
        Commands::Serve => {
            init_tracing(&cfg);
            let addr: SocketAddr = cfg.bind_http.as_str().parse()?;
            if catalog.load_all().is_empty() {
                warn!(path = %catalog.path().display(), "update catalog is empty");
            }
            let state = AppState {
                events,
                catalog,
                download_url: cfg.download_url.clone(),
                download_link: cfg.download_link.clone(),
            };
            info!(version = env!("CARGO_PKG_VERSION"), "dltally starting");
            server::serve_http(addr, state, &cfg.cors_origins, shutdown_signal()).await?;
            info!("dltally stopped");
        }
        Commands::Summary => {
            let summary = aggregate::summarize(&events.load_all()?);
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }
    Ok(())
}

/// Install the global subscriber. `RUST_LOG` wins over `LOG_LEVEL`.
fn init_tracing(cfg: &Settings) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        cfg.log_level.parse::<EnvFilter>().unwrap_or_else(|e| {
            eprintln!(
                "WARN: LOG_LEVEL='{}' is not a valid filter ({e}); falling back to 'info'",
                cfg.log_level
            );
            EnvFilter::new("info")
        })
    });
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true);
    // A subscriber may already be installed when running under tests.
    let result = if cfg.log_json {
        subscriber.json().try_init()
    } else {
        subscriber.try_init()
    };
    if let Err(e) = result {
        eprintln!("WARN: tracing already initialised: {e}");
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to install CTRL+C handler");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

/// Settings written to a freshly generated `.env`, after `DATA_DIR`.
const DEFAULT_SETTINGS: &[(&str, &str)] = &[
    ("BIND_HTTP", "0.0.0.0:4000"),
    ("DOWNLOAD_URL", "https://example.com/download"),
    ("DOWNLOAD_LINK", "/api/download"),
    ("CORS_ORIGINS", ""),
    ("LOG_LEVEL", "info"),
    ("LOG_JSON", "0"),
];

/// Write a starter `.env` at `path` unless one exists. The data directory is
/// placed beside it as `dltally-data`.
fn ensure_env_file(path: &str) -> anyhow::Result<()> {
    let env_path = Path::new(path);
    if env_path.exists() {
        return Ok(());
    }
    let base_dir = match env_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(dir) => {
            fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
            dir.to_path_buf()
        }
        None => std::env::current_dir()?,
    };
    let data_dir = base_dir.join("dltally-data");
    let body = DEFAULT_SETTINGS.iter().fold(
        format!("DATA_DIR={}\n", data_dir.display()),
        |mut body, (key, value)| {
            body.push_str(&format!("{key}={value}\n"));
            body
        },
    );
    fs::write(env_path, body).with_context(|| format!("writing {}", env_path.display()))?;
    Ok(())
}

#[cfg(not(test))]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    run(cli).await
}
