//! # contentful-sync CLI interface
//!
//! Command parsing and orchestration only. The pipelines themselves live in
//! `contentful-sync-core`; this module loads configuration, opens the
//! database, builds the HTTP client and prints a summary of each report.
//!
//! Programmatic callers (and the integration tests) can construct a [`Cli`]
//! and call [`run`] directly.
use crate::api::ContentfulClient;
use crate::load_config::{config_path, load_config, Settings};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use contentful_sync_core::cache::MemoryCache;
use contentful_sync_core::locale::LocaleResolver;
use contentful_sync_core::materializer::Materializer;
use contentful_sync_core::store::SqliteStore;
use contentful_sync_core::synchronise::{flatten, sync_data, sync_locales, TypeSyncReport};
use std::sync::Arc;

/// CLI for contentful-sync: mirror a Contentful space into SQLite.
#[derive(Parser)]
#[clap(
    name = "contentful-sync",
    version,
    about = "Stage, flatten and localise Contentful entries and assets into a relational store"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Stage every asset and entry of the space into the sync_entries table
    SyncData {
        /// Read from the Preview API instead of the Delivery API
        #[clap(long)]
        preview: bool,
    },
    /// Materialize staged payloads into per-content-type tables and assets
    SyncFlatten,
    /// Replace the locales table with the locales of the space
    SyncLocales {
        /// Read from the Preview API instead of the Delivery API
        #[clap(long)]
        preview: bool,
    },
}

/// Async CLI entrypoint shared by `main()` and the integration tests.
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    let config = load_config(config_path())?;
    let settings = Settings::from_env();
    let store = Arc::new(
        SqliteStore::connect(&settings.database_url)
            .await
            .with_context(|| format!("Failed to open database {}", settings.database_url))?,
    );
    let resolver = Arc::new(LocaleResolver::new(
        store.clone(),
        Arc::new(MemoryCache::new()),
        &config,
    ));

    match cli.command {
        Commands::SyncData { preview } => {
            let (space_id, token) = settings.delivery(preview)?;
            let mut client = ContentfulClient::new(space_id, &settings.environment, token, preview);
            tracing::info!(command = "sync-data", preview, "Starting data synchronisation");

            let report = sync_data(&mut client, store.as_ref(), store.as_ref()).await?;
            for part in [&report.assets, &report.entries] {
                println!("{}", summary_line(part));
                if let Some(error) = &part.error {
                    eprintln!("{}: {error}", part.kind.as_str());
                }
            }
            println!("Release {} is current", report.release.id);
        }
        Commands::SyncFlatten => {
            tracing::info!(command = "sync-flatten", "Starting flatten");
            let materializer = Materializer::new(resolver.clone(), store.clone());
            let report = flatten(store.as_ref(), &materializer, &resolver).await?;
            println!(
                "Flattened {} entries and {} assets into {} rows ({} fields skipped, {} failed)",
                report.entries,
                report.assets,
                report.rows,
                report.skipped_fields,
                report.failed.len()
            );
            for (contentful_id, reason) in &report.failed {
                eprintln!("{contentful_id}: {reason}");
            }
        }
        Commands::SyncLocales { preview } => {
            let (space_id, token) = settings.delivery(preview)?;
            let client = ContentfulClient::new(space_id, &settings.environment, token, preview);
            tracing::info!(command = "sync-locales", preview, "Starting locale synchronisation");

            let locales = sync_locales(&client, store.as_ref(), &resolver).await?;
            for locale in &locales {
                println!(
                    "{} ({}){}",
                    locale.code,
                    locale.label,
                    if locale.is_default { " default" } else { "" }
                );
            }
        }
    }

    tracing::info!("exit");
    Ok(())
}

/// One stdout line per synced type. Transport errors go to stderr separately.
fn summary_line(part: &TypeSyncReport) -> String {
    let status = if part.is_complete() { "" } else { " (aborted)" };
    format!(
        "{}: {} staged in {} pages, {} skipped{status}",
        part.kind.as_str(),
        part.staged,
        part.pages,
        part.skipped
    )
}
