// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{net::SocketAddr, path::PathBuf, process::ExitCode};

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use pii_vault::{
    api::router,
    cleanup::CleanupTask,
    config::{Config, DEFAULT_CONF_FILE, DEFAULT_DB_FILE, DEFAULT_LOG_FILTER, LOG_FORMAT_ENV, MASTER_KEY_ENV},
    crypto::{generate_master_key, KeyManager, MasterKey},
    state::AppState,
    storage::{repository::XtokenRepository, Store},
};

/// Self-hosted vault for personal data.
#[derive(Debug, Parser)]
#[command(name = "pii-vault", version, about)]
struct Cli {
    /// Create a new database, print the master key and root token, and exit.
    #[arg(long)]
    init: bool,

    /// Master key as 64 hex characters.
    #[arg(long, env = MASTER_KEY_ENV, hide_env_values = true)]
    masterkey: Option<String>,

    /// Database file.
    #[arg(long, default_value = DEFAULT_DB_FILE)]
    db: PathBuf,

    /// JSON configuration file. Missing file means defaults.
    #[arg(long, default_value = DEFAULT_CONF_FILE)]
    conf: PathBuf,
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    if std::env::var(LOG_FORMAT_ENV).is_ok_and(|v| v.eq_ignore_ascii_case("json")) {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Create the store and the root token. Both secrets are shown once.
fn initialize(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let master = match &cli.masterkey {
        Some(hex) => MasterKey::from_hex(hex)?,
        None => generate_master_key()?,
    };
    let master_hex = master.to_hex();
    let store = Store::create_new(&cli.db)?;
    let keys = KeyManager::new(master);
    let root = XtokenRepository::new(&store, &keys).create_root()?;

    info!(db = %cli.db.display(), "Database initialized");
    println!("Master key (store it safely, it is not saved): {master_hex}");
    println!("Root token: {root}");
    Ok(())
}

/// SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
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
    info!("Shutdown signal received");
}

async fn serve(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let hex = cli
        .masterkey
        .as_deref()
        .ok_or_else(|| format!("master key missing: pass --masterkey or set {MASTER_KEY_ENV}"))?;
    let keys = KeyManager::new(MasterKey::from_hex(hex)?);
    let store = Store::open(&cli.db)
        .map_err(|e| format!("cannot open {} (run with --init first?): {e}", cli.db.display()))?;
    let config = Config::load(&cli.conf)?;
    config.check_notification_urls();

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| format!("invalid bind address: {e}"))?;

    let state = AppState::new(store, keys, config);
    let shutdown = state.shutdown.clone();
    let cleanup = tokio::spawn(CleanupTask::new(state.clone()).run(shutdown.clone()));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "PII vault listening");

    let served = axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await;

    shutdown.cancel();
    if let Err(e) = cleanup.await {
        error!(error = %e, "Cleanup task ended abnormally");
    }
    served?;
    info!("Server stopped");
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let result = if cli.init {
        initialize(&cli)
    } else {
        serve(cli).await
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Fatal");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
