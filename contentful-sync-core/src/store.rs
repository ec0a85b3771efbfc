//! SQLite implementation of every store trait.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use tracing::{debug, info};

use crate::contract::{
    AssetRow, ContentStore, EntryRow, LocaleStore, Release, ReleaseStore, StagingStore, SyncEntry,
};
use crate::error::StoreError;
use crate::field::Field;
use crate::locale::Locale;

/// Prefix of every per-content-type table. None of the store's own tables
/// carry it.
const ENTRY_TABLE_PREFIX: &str = "entry_";

const SCHEMA: [&str; 4] = [
    "CREATE TABLE IF NOT EXISTS sync_entries (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        contentful_id TEXT NOT NULL,
        contentful_type TEXT NOT NULL,
        payload TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS locales (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        label TEXT NOT NULL DEFAULT '',
        code TEXT NOT NULL,
        locale TEXT NOT NULL DEFAULT '',
        country TEXT NOT NULL DEFAULT '',
        fallback_code TEXT,
        is_default INTEGER NOT NULL DEFAULT 0,
        is_editable INTEGER NOT NULL DEFAULT 0,
        is_publishable INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS assets (
        contentful_id TEXT NOT NULL,
        locale TEXT NOT NULL,
        country TEXT NOT NULL,
        title TEXT,
        description TEXT,
        url TEXT,
        file_name TEXT,
        content_type TEXT,
        size INTEGER,
        width INTEGER,
        height INTEGER,
        PRIMARY KEY (contentful_id, locale, country)
    )",
    "CREATE TABLE IF NOT EXISTS releases (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        current INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )",
];

const LOCALE_COLUMNS: &str =
    "id, label, code, locale, country, fallback_code, is_default, is_editable, is_publishable";

const ASSET_COLUMNS: &str =
    "contentful_id, locale, country, title, description, url, file_name, content_type, size, width, height";

/// Maps a content type id to its table name.
///
/// SQLite compares table names case-insensitively while content type ids are
/// case-sensitive, so the id is encoded into lowercase: `_` becomes `__` and
/// an uppercase letter becomes `_` plus the letter. `Article` and `article`
/// therefore land in `entry__article` and `entry_article`. Only plain
/// identifiers are accepted.
fn entry_table(content_type: &str) -> Result<String, StoreError> {
    static IDENT: OnceLock<Regex> = OnceLock::new();
    let ident = IDENT.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_\-]{0,63}$").expect("static regex is valid")
    });

    if !ident.is_match(content_type) {
        return Err(StoreError::InvalidTableName(content_type.to_string()));
    }

    let mut table = String::with_capacity(ENTRY_TABLE_PREFIX.len() + content_type.len() * 2);
    table.push_str(ENTRY_TABLE_PREFIX);
    for c in content_type.chars() {
        match c {
            '_' => table.push_str("__"),
            c if c.is_ascii_uppercase() => {
                table.push('_');
                table.push(c.to_ascii_lowercase());
            }
            c => table.push(c),
        }
    }
    Ok(table)
}

type RawEntryRow = (String, String, String, String);

fn decode_entry_row((contentful_id, locale, country, fields): RawEntryRow) -> Result<EntryRow, StoreError> {
    let fields: BTreeMap<String, Field> = serde_json::from_str(&fields)?;
    Ok(EntryRow {
        contentful_id,
        locale,
        country,
        fields,
    })
}

pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Connects to `url` (e.g. `sqlite://contentful.db`), creating the file
    /// if needed, and runs migrations.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let opts = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));

        // A single long-lived connection: writes are sequential anyway and
        // `sqlite::memory:` databases vanish with their connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        info!(url, "Connected to SQLite store");
        Ok(store)
    }

    pub async fn in_memory() -> Result<Self, StoreError> {
        Self::connect("sqlite::memory:").await
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    async fn table_exists(&self, name: &str) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ? COLLATE NOCASE)",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn ensure_entry_table(&self, table: &str) -> Result<(), StoreError> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS \"{table}\" (
                contentful_id TEXT NOT NULL,
                locale TEXT NOT NULL,
                country TEXT NOT NULL,
                fields TEXT NOT NULL,
                PRIMARY KEY (contentful_id, locale, country)
            )"
        );
        sqlx::query(&sql).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl StagingStore for SqliteStore {
    async fn truncate(&self) -> Result<(), StoreError> {
        let removed = sqlx::query("DELETE FROM sync_entries")
            .execute(&self.pool)
            .await?
            .rows_affected();
        debug!(removed, "Truncated sync_entries");
        Ok(())
    }

    async fn insert_page(&self, entries: &[SyncEntry]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        for entry in entries {
            sqlx::query(
                "INSERT INTO sync_entries (contentful_id, contentful_type, payload) VALUES (?, ?, ?)",
            )
            .bind(&entry.contentful_id)
            .bind(&entry.contentful_type)
            .bind(&entry.payload)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn staged(&self) -> Result<Vec<SyncEntry>, StoreError> {
        let rows: Vec<(String, String, String)> = sqlx::query_as(
            "SELECT contentful_id, contentful_type, payload FROM sync_entries ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(contentful_id, contentful_type, payload)| SyncEntry {
                contentful_id,
                contentful_type,
                payload,
            })
            .collect())
    }
}

#[async_trait]
impl LocaleStore for SqliteStore {
    async fn find_default(&self) -> Result<Option<Locale>, StoreError> {
        let sql = format!("SELECT {LOCALE_COLUMNS} FROM locales WHERE is_default = 1 ORDER BY id LIMIT 1");
        Ok(sqlx::query_as::<_, Locale>(&sql)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Locale>, StoreError> {
        let sql = format!("SELECT {LOCALE_COLUMNS} FROM locales WHERE code = ? ORDER BY id LIMIT 1");
        Ok(sqlx::query_as::<_, Locale>(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn all(&self) -> Result<Vec<Locale>, StoreError> {
        let sql = format!("SELECT {LOCALE_COLUMNS} FROM locales ORDER BY id");
        Ok(sqlx::query_as::<_, Locale>(&sql).fetch_all(&self.pool).await?)
    }

    async fn replace_all(&self, locales: &[Locale]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM locales").execute(&mut *tx).await?;
        for locale in locales {
            sqlx::query(
                "INSERT INTO locales (label, code, locale, country, fallback_code, is_default, is_editable, is_publishable)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&locale.label)
            .bind(&locale.code)
            .bind(&locale.locale)
            .bind(&locale.country)
            .bind(&locale.fallback_code)
            .bind(locale.is_default)
            .bind(locale.is_editable)
            .bind(locale.is_publishable)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl ContentStore for SqliteStore {
    async fn replace_entry(
        &self,
        table: &str,
        contentful_id: &str,
        rows: &[EntryRow],
    ) -> Result<(), StoreError> {
        let table = entry_table(table)?;
        self.ensure_entry_table(&table).await?;

        let delete = format!("DELETE FROM \"{table}\" WHERE contentful_id = ?");
        let insert = format!(
            "INSERT INTO \"{table}\" (contentful_id, locale, country, fields) VALUES (?, ?, ?, ?)"
        );

        let mut tx = self.pool.begin().await?;
        sqlx::query(&delete)
            .bind(contentful_id)
            .execute(&mut *tx)
            .await?;
        for row in rows {
            let fields = serde_json::to_string(&row.fields)?;
            sqlx::query(&insert)
                .bind(&row.contentful_id)
                .bind(&row.locale)
                .bind(&row.country)
                .bind(fields)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn delete_entry(&self, table: &str, contentful_id: &str) -> Result<u64, StoreError> {
        let table = entry_table(table)?;
        if !self.table_exists(&table).await? {
            return Ok(0);
        }
        let sql = format!("DELETE FROM \"{table}\" WHERE contentful_id = ?");
        let result = sqlx::query(&sql)
            .bind(contentful_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn find_entry(
        &self,
        table: &str,
        contentful_id: &str,
        country: &str,
        locale: &str,
    ) -> Result<Option<EntryRow>, StoreError> {
        let table = entry_table(table)?;
        if !self.table_exists(&table).await? {
            return Ok(None);
        }
        let sql = format!(
            "SELECT contentful_id, locale, country, fields FROM \"{table}\"
             WHERE contentful_id = ? AND country = ? AND locale = ?"
        );
        let row: Option<RawEntryRow> = sqlx::query_as(&sql)
            .bind(contentful_id)
            .bind(country)
            .bind(locale)
            .fetch_optional(&self.pool)
            .await?;
        row.map(decode_entry_row).transpose()
    }

    async fn entry_rows(&self, table: &str, contentful_id: &str) -> Result<Vec<EntryRow>, StoreError> {
        let table = entry_table(table)?;
        if !self.table_exists(&table).await? {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT contentful_id, locale, country, fields FROM \"{table}\"
             WHERE contentful_id = ? ORDER BY rowid"
        );
        let rows: Vec<RawEntryRow> = sqlx::query_as(&sql)
            .bind(contentful_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(decode_entry_row).collect()
    }

    async fn replace_asset(&self, contentful_id: &str, rows: &[AssetRow]) -> Result<(), StoreError> {
        let insert = format!(
            "INSERT INTO assets ({ASSET_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        );

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM assets WHERE contentful_id = ?")
            .bind(contentful_id)
            .execute(&mut *tx)
            .await?;
        for row in rows {
            sqlx::query(&insert)
                .bind(&row.contentful_id)
                .bind(&row.locale)
                .bind(&row.country)
                .bind(&row.title)
                .bind(&row.description)
                .bind(&row.url)
                .bind(&row.file_name)
                .bind(&row.content_type)
                .bind(row.size)
                .bind(row.width)
                .bind(row.height)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn delete_asset(&self, contentful_id: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM assets WHERE contentful_id = ?")
            .bind(contentful_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn asset_rows(&self, contentful_id: &str) -> Result<Vec<AssetRow>, StoreError> {
        let sql = format!("SELECT {ASSET_COLUMNS} FROM assets WHERE contentful_id = ? ORDER BY rowid");
        Ok(sqlx::query_as::<_, AssetRow>(&sql)
            .bind(contentful_id)
            .fetch_all(&self.pool)
            .await?)
    }
}

#[async_trait]
impl ReleaseStore for SqliteStore {
    async fn switch_current(&self) -> Result<Release, StoreError> {
        sqlx::query("UPDATE releases SET current = 0 WHERE current = 1")
            .execute(&self.pool)
            .await?;
        let id = sqlx::query("INSERT INTO releases (current) VALUES (1)")
            .execute(&self.pool)
            .await?
            .last_insert_rowid();
        info!(release_id = id, "Switched current release");
        Ok(Release { id, current: true })
    }

    async fn current(&self) -> Result<Vec<Release>, StoreError> {
        let rows: Vec<(i64, bool)> =
            sqlx::query_as("SELECT id, current FROM releases WHERE current = 1 ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows
            .into_iter()
            .map(|(id, current)| Release { id, current })
            .collect())
    }
}
