//! Command-line entry point for **pbddns**
//!
//! * Loads `.env` when present, then flags / env vars / `pbddns.toml`
//! * Sets up tracing with a compact formatter
//! * Optionally re-executes itself in the background (`-d`)
//! * Boots the core logic defined in `pbddns_core`

use anyhow::{Context, Result};
use clap::Parser;
use pbddns_core::{Overrides, bootstrap, load_config};
use std::{env, path::PathBuf};
use tokio::process::Command;
use tracing::{info, warn};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

const DAEMON_ENV: &str = "PBDYNDNS_DAEMON";

/// CLI options
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Path to the config file (optional; environment variables are used if absent)
    #[arg(short, long, env = "PBDDNS_CONFIG", default_value = "pbddns.toml")]
    config: String,

    /// Run in the background
    #[arg(short, long, env = "PBDYNDNS_DAEMON")]
    daemon: bool,

    /// Use the first local IPv4 address instead of the public one
    #[arg(long, env = "PBDYNDNS_LOCAL")]
    local: bool,

    /// Porkbun API key
    #[arg(long, env = "PORKBUN_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Porkbun secret API key
    #[arg(long, env = "PORKBUN_API_SECRET", hide_env_values = true)]
    api_secret: Option<String>,

    /// Domain to update, e.g. `example.com` (falls back to `DOMAIN`)
    #[arg(long, env = "PBDYNDNS_DOMAIN")]
    domain: Option<String>,

    /// Subdomain to update; empty manages the bare domain
    #[arg(long, env = "PBDYNDNS_SUBDOMAIN")]
    subdomain: Option<String>,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            api_key: self.api_key.clone(),
            api_secret: self.api_secret.clone(),
            domain: self.domain.clone(),
            subdomain: self.subdomain.clone(),
            local: self.local,
            fallback_domain: env::var("DOMAIN").ok(),
        }
    }
}

/// Arguments for the background copy: everything except the daemon flag.
fn child_args<I>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    args.into_iter()
        .filter(|a| a != "-d" && a != "--daemon")
        .collect()
}

/// The background copy gets the daemon variable pinned to `false`, so a
/// `.env` that sets it cannot switch daemon mode back on in the child.
fn daemon_command<I>(exe: PathBuf, args: I) -> Command
where
    I: IntoIterator<Item = String>,
{
    let mut cmd = Command::new(exe);
    cmd.args(child_args(args)).env(DAEMON_ENV, "false");
    cmd
}

async fn daemonize() -> Result<()> {
    let exe = env::current_exe().context("cannot locate own executable")?;
    let child = daemon_command(exe, env::args().skip(1))
        .spawn()
        .context("failed to start daemon")?;
    info!(
        "running as daemon with PID {}",
        child.id().map_or_else(|| "?".to_string(), |id| id.to_string())
    );
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("cannot listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                warn!("cannot listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // a missing .env is fine; everything can come from flags or the real env
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().compact())
        .init();

    let cfg = load_config(&cli.config, &cli.overrides())?;

    if cli.daemon {
        return daemonize().await;
    }

    info!("Press Ctrl+C to exit.");
    bootstrap(cfg, shutdown_signal()).await
}
