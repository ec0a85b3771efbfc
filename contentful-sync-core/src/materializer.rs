//! Flattens raw payloads into one row per permitted (country, locale).
//!
//! Every configured locale is considered for every payload. Pairs rejected
//! by the `locales_not_flatten` denylist are skipped. A field value is only
//! stored for a locale when the payload explicitly carries it; fallback is a
//! read-time concern (see [`crate::reader`]).
//!
//! Bad field data never aborts an entry: the field is skipped and reported
//! in [`EntryOutcome::fields`]. Only entry-level problems (no id, no content
//! type, store failure) surface as [`MaterializeError`].

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::contract::{AssetRow, ContentStore, EntryRow};
use crate::error::{FieldError, MaterializeError};
use crate::field::{Field, LocalizedFields};
use crate::locale::{Locale, LocaleResolver};

/// What happened to one field value for one locale.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOutcome {
    Stored {
        field: String,
        code: String,
    },
    Skipped {
        field: String,
        code: String,
        reason: FieldError,
    },
}

impl FieldOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, FieldOutcome::Skipped { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntryOutcome {
    pub contentful_id: String,
    pub table: String,
    pub rows: Vec<EntryRow>,
    pub fields: Vec<FieldOutcome>,
}

impl EntryOutcome {
    pub fn skipped(&self) -> impl Iterator<Item = &FieldOutcome> {
        self.fields.iter().filter(|f| f.is_skipped())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssetOutcome {
    pub contentful_id: String,
    pub rows: Vec<AssetRow>,
}

/// Result of [`Materializer::upsert`], which accepts either kind of payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Materialized {
    Entry(EntryOutcome),
    Asset(AssetOutcome),
}

/// `true` for `Asset`/`DeletedAsset` payloads.
pub fn is_asset_payload(payload: &Value) -> bool {
    matches!(
        payload.pointer("/sys/type").and_then(Value::as_str),
        Some("Asset") | Some("DeletedAsset")
    )
}

fn payload_id(payload: &Value) -> Result<String, MaterializeError> {
    if !payload.is_object() {
        return Err(MaterializeError::NotAnObject);
    }
    payload
        .pointer("/sys/id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or(MaterializeError::MissingId)
}

fn content_type(payload: &Value, id: &str) -> Result<String, MaterializeError> {
    payload
        .pointer("/sys/contentType/sys/id")
        .and_then(Value::as_str)
        .filter(|ct| !ct.is_empty())
        .map(str::to_string)
        .ok_or_else(|| MaterializeError::MissingContentType(id.to_string()))
}

pub struct Materializer {
    resolver: Arc<LocaleResolver>,
    store: Arc<dyn ContentStore>,
}

impl Materializer {
    pub fn new(resolver: Arc<LocaleResolver>, store: Arc<dyn ContentStore>) -> Self {
        Self { resolver, store }
    }

    /// (code, country, locale) triples that may be written, in locale order,
    /// with duplicate (country, locale) pairs collapsed onto the first code.
    fn targets(&self, locales: &[Locale]) -> Vec<(String, String, String)> {
        let mut seen = BTreeSet::new();
        let mut targets = Vec::new();
        for row in locales {
            let (country, locale) = self.resolver.split(&row.code);
            if !self.resolver.can_be_saved(&country, &locale) {
                debug!(code = %row.code, "Locale listed in locales_not_flatten, not persisted");
                continue;
            }
            if seen.insert((country.clone(), locale.clone())) {
                targets.push((row.code.clone(), country, locale));
            }
        }
        targets
    }

    /// Pure flattening of an entry payload, no I/O.
    pub fn flatten_entry(
        &self,
        payload: &Value,
        locales: &[Locale],
    ) -> Result<EntryOutcome, MaterializeError> {
        let contentful_id = payload_id(payload)?;
        let table = content_type(payload, &contentful_id)?;
        let fields = LocalizedFields::from_payload(payload);

        let mut rows = Vec::new();
        let mut outcomes = Vec::new();
        for (code, country, locale) in self.targets(locales) {
            let mut values = BTreeMap::new();
            for name in fields.names() {
                let Some(raw) = fields.value(name, &code) else {
                    continue;
                };
                match Field::parse(raw) {
                    Ok(field) => {
                        values.insert(name.to_string(), field);
                        outcomes.push(FieldOutcome::Stored {
                            field: name.to_string(),
                            code: code.clone(),
                        });
                    }
                    Err(reason) => {
                        warn!(
                            contentful_id = %contentful_id,
                            field = name,
                            code = %code,
                            error = %reason,
                            "Skipping malformed field"
                        );
                        outcomes.push(FieldOutcome::Skipped {
                            field: name.to_string(),
                            code: code.clone(),
                            reason,
                        });
                    }
                }
            }
            rows.push(EntryRow {
                contentful_id: contentful_id.clone(),
                locale,
                country,
                fields: values,
            });
        }

        Ok(EntryOutcome {
            contentful_id,
            table,
            rows,
            fields: outcomes,
        })
    }

    /// Pure flattening of an asset payload, no I/O.
    pub fn flatten_asset(
        &self,
        payload: &Value,
        locales: &[Locale],
    ) -> Result<AssetOutcome, MaterializeError> {
        let contentful_id = payload_id(payload)?;
        let fields = LocalizedFields::from_payload(payload);

        let text = |name: &str, code: &str| {
            fields
                .value(name, code)
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        let rows = self
            .targets(locales)
            .into_iter()
            .map(|(code, country, locale)| {
                let file = fields.value("file", &code);
                let file_str = |pointer: &str| {
                    file.and_then(|f| f.pointer(pointer))
                        .and_then(Value::as_str)
                        .map(str::to_string)
                };
                let file_int =
                    |pointer: &str| file.and_then(|f| f.pointer(pointer)).and_then(Value::as_i64);

                AssetRow {
                    contentful_id: contentful_id.clone(),
                    locale,
                    country,
                    title: text("title", &code),
                    description: text("description", &code),
                    url: file_str("/url"),
                    file_name: file_str("/fileName"),
                    content_type: file_str("/contentType"),
                    size: file_int("/details/size"),
                    width: file_int("/details/image/width"),
                    height: file_int("/details/image/height"),
                }
            })
            .collect();

        Ok(AssetOutcome {
            contentful_id,
            rows,
        })
    }

    pub async fn upsert_entry(
        &self,
        payload: &Value,
        locales: &[Locale],
    ) -> Result<EntryOutcome, MaterializeError> {
        let outcome = self.flatten_entry(payload, locales)?;
        self.store
            .replace_entry(&outcome.table, &outcome.contentful_id, &outcome.rows)
            .await?;
        info!(
            contentful_id = %outcome.contentful_id,
            table = %outcome.table,
            rows = outcome.rows.len(),
            skipped = outcome.skipped().count(),
            "Materialized entry"
        );
        Ok(outcome)
    }

    pub async fn upsert_asset(
        &self,
        payload: &Value,
        locales: &[Locale],
    ) -> Result<AssetOutcome, MaterializeError> {
        let outcome = self.flatten_asset(payload, locales)?;
        self.store
            .replace_asset(&outcome.contentful_id, &outcome.rows)
            .await?;
        info!(
            contentful_id = %outcome.contentful_id,
            rows = outcome.rows.len(),
            "Materialized asset"
        );
        Ok(outcome)
    }

    /// Loads the configured locales and upserts either kind of payload.
    pub async fn upsert(&self, payload: &Value) -> Result<Materialized, MaterializeError> {
        let locales = self.resolver.all().await?;
        if is_asset_payload(payload) {
            self.upsert_asset(payload, &locales)
                .await
                .map(Materialized::Asset)
        } else {
            self.upsert_entry(payload, &locales)
                .await
                .map(Materialized::Entry)
        }
    }

    /// Removes every locale row of the payload's `contentful_id`.
    pub async fn delete(&self, payload: &Value) -> Result<u64, MaterializeError> {
        let contentful_id = payload_id(payload)?;
        let removed = if is_asset_payload(payload) {
            self.store.delete_asset(&contentful_id).await?
        } else {
            let table = content_type(payload, &contentful_id)?;
            self.store.delete_entry(&table, &contentful_id).await?
        };
        info!(contentful_id = %contentful_id, removed, "Deleted rows");
        Ok(removed)
    }
}
