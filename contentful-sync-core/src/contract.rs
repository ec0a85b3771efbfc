#![allow(unused)]

//! # contract: the I/O seams of the sync pipelines
//!
//! Every collaborator the core talks to is described here as an async trait:
//! the remote delta-sync cursor, the remote locales listing, and the four
//! relational stores (staging, locales, content, releases).
//!
//! ## Mocking & Testing
//! - Traits are annotated for `mockall`; the generated `Mock*` types are
//!   exported with the default `test-export-mocks` feature so integration
//!   tests and the CLI crate can use them.
//! - [`crate::store::SqliteStore`] implements every store trait and runs
//!   happily against `sqlite::memory:` for end-to-end tests.
//!
//! ## Data types
//! Row types are plain data mirroring the tables they are written to.

use std::collections::BTreeMap;

use async_trait::async_trait;
use mockall::{automock, predicate::*};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{StoreError, SyncApiError};
use crate::field::Field;
use crate::locale::Locale;

/// Top-level object kinds a sync cursor can be scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncType {
    Entry,
    Asset,
}

impl SyncType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncType::Entry => "Entry",
            SyncType::Asset => "Asset",
        }
    }
}

/// Paginated delta-sync cursor. Cursor state lives behind the implementor;
/// `sync_next` continues whatever `sync_initial` started and returns an
/// empty page once the cursor is exhausted.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait SyncApi: Send + Sync {
    async fn sync_initial(&mut self, kind: SyncType) -> Result<Vec<Value>, SyncApiError>;

    async fn sync_next(&mut self) -> Result<Vec<Value>, SyncApiError>;
}

/// A locale as declared by the remote space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteLocale {
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub fallback_code: Option<String>,
    #[serde(default)]
    pub default: bool,
    #[serde(default)]
    pub content_management_api: bool,
    #[serde(default)]
    pub content_delivery_api: bool,
}

/// Listing of the locales configured on the remote space.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait LocaleApi: Send + Sync {
    async fn fetch_locales(&self) -> Result<Vec<RemoteLocale>, SyncApiError>;
}

/// One raw payload staged by the data-sync run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncEntry {
    pub contentful_id: String,
    /// `"asset"` or the entry's content type id.
    pub contentful_type: String,
    /// JSON text of the payload as received.
    pub payload: String,
}

/// Staging table (`sync_entries`).
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait StagingStore: Send + Sync {
    async fn truncate(&self) -> Result<(), StoreError>;

    /// Inserts a whole page inside one transaction.
    async fn insert_page(&self, entries: &[SyncEntry]) -> Result<(), StoreError>;

    async fn staged(&self) -> Result<Vec<SyncEntry>, StoreError>;
}

/// The `locales` table. Read-only for everything but the locale sync job.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait LocaleStore: Send + Sync {
    async fn find_default(&self) -> Result<Option<Locale>, StoreError>;

    async fn find_by_code(&self, code: &str) -> Result<Option<Locale>, StoreError>;

    async fn all(&self) -> Result<Vec<Locale>, StoreError>;

    async fn replace_all(&self, locales: &[Locale]) -> Result<(), StoreError>;
}

/// One flattened row of a content type table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryRow {
    pub contentful_id: String,
    pub locale: String,
    pub country: String,
    pub fields: BTreeMap<String, Field>,
}

impl EntryRow {
    /// `contentful_id` referenced by link field `field`, as read by the
    /// accessors rendered in [`crate::codegen`].
    pub fn link_id(&self, field: &str) -> Option<&str> {
        self.fields
            .get(field)
            .and_then(Field::as_link)
            .map(|link| link.contentful_id.as_str())
    }
}

/// One flattened row of the `assets` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AssetRow {
    pub contentful_id: String,
    pub locale: String,
    pub country: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub size: Option<i64>,
    pub width: Option<i64>,
    pub height: Option<i64>,
}

/// Target tables for materialized entries and assets.
///
/// `replace_*` fully replaces every row of the given `contentful_id` in one
/// transaction, so no field set from a previous schema survives.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn replace_entry(
        &self,
        table: &str,
        contentful_id: &str,
        rows: &[EntryRow],
    ) -> Result<(), StoreError>;

    /// Returns the number of rows removed.
    async fn delete_entry(&self, table: &str, contentful_id: &str) -> Result<u64, StoreError>;

    async fn find_entry(
        &self,
        table: &str,
        contentful_id: &str,
        country: &str,
        locale: &str,
    ) -> Result<Option<EntryRow>, StoreError>;

    async fn entry_rows(&self, table: &str, contentful_id: &str)
        -> Result<Vec<EntryRow>, StoreError>;

    async fn replace_asset(&self, contentful_id: &str, rows: &[AssetRow])
        -> Result<(), StoreError>;

    async fn delete_asset(&self, contentful_id: &str) -> Result<u64, StoreError>;

    async fn asset_rows(&self, contentful_id: &str) -> Result<Vec<AssetRow>, StoreError>;
}

/// A release marker row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub id: i64,
    pub current: bool,
}

#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ReleaseStore: Send + Sync {
    /// Unsets every current release, then inserts a new current one.
    /// The two steps are separate statements: a crash in between leaves no
    /// current release.
    async fn switch_current(&self) -> Result<Release, StoreError>;

    async fn current(&self) -> Result<Vec<Release>, StoreError>;
}
