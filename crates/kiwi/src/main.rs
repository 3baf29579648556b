//! # kiwi
//!
//! Operator CLI for the Relay Kiwi store: applies schema migrations and runs
//! read-only lookups against a store file.

#![deny(unsafe_code)]

mod commands;
mod logging;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use kiwi_settings::{DatabaseSettings, KiwiSettings};
use kiwi_store::{ConnectionConfig, MigrationSource, StoreConfig};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::commands::Command;

/// Relay Kiwi store CLI.
#[derive(Parser, Debug)]
#[command(name = "kiwi", about = "Relay Kiwi store CLI")]
struct Cli {
    /// Settings file (defaults to `~/.kiwi/settings.json`).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Path to the `SQLite` database (overrides settings if specified).
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Directory of `NNN_description.sql` migration files to use instead of
    /// the embedded ones.
    #[arg(long, global = true)]
    migrations_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}

fn load_settings(cli: &Cli) -> Result<KiwiSettings> {
    let mut settings = match &cli.settings {
        Some(path) => kiwi_settings::load_settings_from_path(path),
        None => kiwi_settings::load_settings(),
    }
    .context("Failed to load settings")?;

    if let Some(path) = &cli.db_path {
        settings.database.path = Some(path.clone());
    }
    if let Some(dir) = &cli.migrations_dir {
        settings.database.migrations_dir = Some(dir.clone());
    }
    Ok(settings)
}

fn store_config(db: &DatabaseSettings) -> Result<StoreConfig> {
    let path = db.resolved_path(&kiwi_settings::kiwi_dir());
    ensure_parent_dir(&path)?;
    let migrations = db
        .migrations_dir
        .clone()
        .map_or(MigrationSource::Embedded, MigrationSource::Directory);

    Ok(StoreConfig {
        path: Some(path),
        migrations,
        connection: ConnectionConfig {
            pool_size: db.pool_size,
            busy_timeout_ms: db.busy_timeout_ms,
            cache_size_kib: db.cache_size_kib,
            connection_timeout_ms: db.connection_timeout_ms,
        },
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(&cli)?;
    logging::init_subscriber(&settings.logging);

    let config = store_config(&settings.database)?;
    let op_timeout_ms = settings.database.op_timeout_ms;
    let op_timeout = (op_timeout_ms > 0).then(|| Duration::from_millis(op_timeout_ms));
    info!(
        path = ?config.path,
        pool_size = config.connection.pool_size,
        command = ?cli.command,
        "starting"
    );

    let token = CancellationToken::new();
    let interrupt = token.clone();
    drop(tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling in-flight operation");
            interrupt.cancel();
        }
    }));

    let command = cli.command;
    let output =
        tokio::task::spawn_blocking(move || commands::run(&config, &command, token, op_timeout))
            .await
            .context("Store task panicked")??;

    println!("{output}");
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
