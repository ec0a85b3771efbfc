//! High-level pipelines: data sync, flatten and locale sync.
//!
//! # Data sync ([`sync_data`])
//! A sequential batch run that:
//!   - switches the current release marker
//!   - truncates the staging table
//!   - pages through the `Asset` cursor, then the `Entry` cursor, staging
//!     each page inside its own transaction
//!
//! A transport failure ends only the loop of the type it happened in. Pages
//! committed before the failure stay staged; the run carries on with the
//! next type and still returns `Ok`. Callers detect partial syncs through
//! [`TypeSyncReport::error`] and the logs, not through the result; the CLI
//! prints that error to stderr.
//!
//! # Flatten ([`flatten`])
//! Materializes every staged payload into its target table. One bad payload
//! is logged and counted, never fatal for the batch.
//!
//! # Locale sync ([`sync_locales`])
//! Replaces the `locales` table from the remote space and invalidates the
//! resolver's cache.

use serde_json::Value;
use tracing::{error, info, warn};

use crate::contract::{
    LocaleApi, LocaleStore, Release, ReleaseStore, StagingStore, SyncApi, SyncEntry, SyncType,
};
use crate::error::{LocaleSyncError, StoreError};
use crate::locale::{Locale, LocaleResolver};
use crate::materializer::Materializer;

/// Staged `contentful_type` of assets.
pub const ASSET_TYPE: &str = "asset";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeSyncReport {
    pub kind: SyncType,
    pub pages: usize,
    pub staged: usize,
    /// Items without the ids needed to stage them.
    pub skipped: usize,
    /// Transport error that ended this type's loop early.
    pub error: Option<String>,
}

impl TypeSyncReport {
    fn new(kind: SyncType) -> Self {
        Self {
            kind,
            pages: 0,
            staged: 0,
            skipped: 0,
            error: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncDataReport {
    pub release: Release,
    pub assets: TypeSyncReport,
    pub entries: TypeSyncReport,
}

pub async fn sync_data<A, S, R>(
    api: &mut A,
    staging: &S,
    releases: &R,
) -> Result<SyncDataReport, StoreError>
where
    A: SyncApi + ?Sized,
    S: StagingStore + ?Sized,
    R: ReleaseStore + ?Sized,
{
    info!("[SYNC] Starting data synchronisation");
    let release = releases.switch_current().await?;

    info!("[SYNC] Clean previous synced data");
    staging.truncate().await?;

    info!("[SYNC] Syncing assets...");
    let assets = sync_type(api, staging, SyncType::Asset).await?;

    info!("[SYNC] Syncing entries...");
    let entries = sync_type(api, staging, SyncType::Entry).await?;

    info!(
        release_id = release.id,
        assets = assets.staged,
        entries = entries.staged,
        complete = assets.is_complete() && entries.is_complete(),
        "[SYNC] Data synchronisation finished"
    );
    Ok(SyncDataReport {
        release,
        assets,
        entries,
    })
}

async fn sync_type<A, S>(api: &mut A, staging: &S, kind: SyncType) -> Result<TypeSyncReport, StoreError>
where
    A: SyncApi + ?Sized,
    S: StagingStore + ?Sized,
{
    let mut report = TypeSyncReport::new(kind);

    let mut page = match api.sync_initial(kind).await {
        Ok(page) => page,
        Err(e) => {
            report_transport_error(&mut report, &e);
            return Ok(report);
        }
    };

    while !page.is_empty() {
        let entries = stage_page(kind, &page, &mut report)?;
        staging.insert_page(&entries).await?;
        report.pages += 1;
        report.staged += entries.len();
        info!(kind = kind.as_str(), page = report.pages, items = entries.len(), "[SYNC] Staged page");

        page = match api.sync_next().await {
            Ok(page) => page,
            Err(e) => {
                report_transport_error(&mut report, &e);
                return Ok(report);
            }
        };
    }

    Ok(report)
}

fn report_transport_error(report: &mut TypeSyncReport, e: &dyn std::error::Error) {
    error!(kind = report.kind.as_str(), error = %e, pages = report.pages, "[SYNC][ERROR] Sync aborted");
    report.error = Some(e.to_string());
}

fn stage_page(
    kind: SyncType,
    page: &[Value],
    report: &mut TypeSyncReport,
) -> Result<Vec<SyncEntry>, StoreError> {
    let mut entries = Vec::with_capacity(page.len());
    for item in page {
        let id = item.pointer("/sys/id").and_then(Value::as_str);
        let contentful_type = match kind {
            SyncType::Asset => Some(ASSET_TYPE),
            SyncType::Entry => item.pointer("/sys/contentType/sys/id").and_then(Value::as_str),
        };
        let (Some(id), Some(contentful_type)) = (id, contentful_type) else {
            warn!(kind = kind.as_str(), "[SYNC] Skipping item without sys.id or content type");
            report.skipped += 1;
            continue;
        };
        entries.push(SyncEntry {
            contentful_id: id.to_string(),
            contentful_type: contentful_type.to_string(),
            payload: serde_json::to_string(item)?,
        });
    }
    Ok(entries)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlattenReport {
    pub entries: usize,
    pub assets: usize,
    pub rows: usize,
    pub skipped_fields: usize,
    /// `(contentful_id, reason)` of payloads that could not be materialized.
    pub failed: Vec<(String, String)>,
}

pub async fn flatten<S>(
    staging: &S,
    materializer: &Materializer,
    resolver: &LocaleResolver,
) -> Result<FlattenReport, StoreError>
where
    S: StagingStore + ?Sized,
{
    let locales = resolver.all().await?;
    let staged = staging.staged().await?;
    info!(items = staged.len(), locales = locales.len(), "[FLATTEN] Starting");

    let mut report = FlattenReport::default();
    for item in staged {
        let payload: Value = match serde_json::from_str(&item.payload) {
            Ok(payload) => payload,
            Err(e) => {
                error!(contentful_id = %item.contentful_id, error = %e, "[FLATTEN][ERROR] Undecodable payload");
                report.failed.push((item.contentful_id, e.to_string()));
                continue;
            }
        };

        let result = if item.contentful_type == ASSET_TYPE {
            materializer.upsert_asset(&payload, &locales).await.map(|outcome| {
                report.assets += 1;
                report.rows += outcome.rows.len();
            })
        } else {
            materializer.upsert_entry(&payload, &locales).await.map(|outcome| {
                report.entries += 1;
                report.rows += outcome.rows.len();
                report.skipped_fields += outcome.skipped().count();
            })
        };

        if let Err(e) = result {
            error!(contentful_id = %item.contentful_id, error = %e, "[FLATTEN][ERROR] Materialization failed");
            report.failed.push((item.contentful_id, e.to_string()));
        }
    }

    info!(
        entries = report.entries,
        assets = report.assets,
        rows = report.rows,
        failed = report.failed.len(),
        "[FLATTEN] Finished"
    );
    Ok(report)
}

pub async fn sync_locales<A, S>(
    api: &A,
    store: &S,
    resolver: &LocaleResolver,
) -> Result<Vec<Locale>, LocaleSyncError>
where
    A: LocaleApi + ?Sized,
    S: LocaleStore + ?Sized,
{
    let remote = api.fetch_locales().await?;
    let locales: Vec<Locale> = remote
        .into_iter()
        .map(|remote| {
            let (country, locale) = resolver.split(&remote.code);
            Locale {
                id: 0,
                label: remote.name,
                code: remote.code,
                locale,
                country,
                fallback_code: remote.fallback_code.filter(|code| !code.is_empty()),
                is_default: remote.default,
                is_editable: remote.content_management_api,
                is_publishable: remote.content_delivery_api,
            }
        })
        .collect();

    store.replace_all(&locales).await?;
    resolver.invalidate();
    info!(locales = locales.len(), "[LOCALES] Locales synchronised");
    Ok(locales)
}
