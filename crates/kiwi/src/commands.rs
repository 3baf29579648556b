//! Subcommand execution. Everything here is blocking and runs off the
//! async runtime.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Subcommand;
use kiwi_store::sqlite::migrations;
use kiwi_store::{OpContext, RelayStore, Resolver, StoreConfig};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Store operations exposed on the command line.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create or upgrade the database schema.
    Migrate,
    /// Print the destination an alias redirects to.
    Resolve {
        /// Station the alias belongs to.
        station: String,
        /// Alias to resolve (case-sensitive).
        alias: String,
    },
    /// List a station's relays as JSON.
    List {
        /// Station to list.
        station: String,
    },
    /// List a station's relays carrying a tag as JSON.
    Tagged {
        /// Station to search.
        station: String,
        /// Tag label.
        label: String,
    },
    /// List a station's tags as JSON.
    Tags {
        /// Station to list.
        station: String,
    },
}

/// Run `command` against the store described by `config` and return what
/// should be printed.
pub fn run(
    config: &StoreConfig,
    command: &Command,
    token: CancellationToken,
    op_timeout: Option<Duration>,
) -> Result<String> {
    let mut ctx = OpContext::with_token(token);
    if let Some(timeout) = op_timeout {
        ctx = ctx.with_timeout(timeout);
    }

    match command {
        Command::Migrate => migrate(config),
        Command::Resolve { station, alias } => with_store(config, |store| {
            Resolver::new(Arc::clone(store))
                .resolve_alias(&ctx, station, alias)
                .with_context(|| format!("Failed to resolve {station}/{alias}"))
        }),
        Command::List { station } => with_store(config, |store| {
            Ok(serde_json::to_string_pretty(&store.get_station_relays(&ctx, station)?)?)
        }),
        Command::Tagged { station, label } => with_store(config, |store| {
            let relays = Resolver::new(Arc::clone(store)).relays_by_tag(&ctx, label, station)?;
            Ok(serde_json::to_string_pretty(&relays)?)
        }),
        Command::Tags { station } => with_store(config, |store| {
            Ok(serde_json::to_string_pretty(&store.get_station_tags(&ctx, station)?)?)
        }),
    }
}

fn migrate(config: &StoreConfig) -> Result<String> {
    let path = config
        .path
        .as_deref()
        .context("migrate needs a database file")?;
    let applied = migrations::apply(&config.migrations, path)
        .with_context(|| format!("Failed to migrate {}", path.display()))?;
    let latest = migrations::latest_version(&config.migrations)?;
    info!(path = %path.display(), applied, latest, "schema up to date");
    Ok(format!("applied {applied} migration(s); schema at version {latest}"))
}

/// Open the store, run `query`, and close the store again.
fn with_store(
    config: &StoreConfig,
    query: impl FnOnce(&Arc<RelayStore>) -> Result<String>,
) -> Result<String> {
    let store = Arc::new(RelayStore::open(config).context("Failed to open relay store")?);
    let output = query(&store);
    if let Some(store) = Arc::into_inner(store) {
        store.close();
    }
    output
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
