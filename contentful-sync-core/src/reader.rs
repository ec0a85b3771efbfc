//! Read-time locale fallback over materialized rows.
//!
//! Rows only hold what the payload carried for their own locale. Missing
//! fields are filled here by following `fallback(code)` one hop at a time
//! until the chain ends or loops.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::contract::{ContentStore, EntryRow};
use crate::error::StoreError;
use crate::locale::LocaleResolver;

pub struct LocalizedReader {
    resolver: Arc<LocaleResolver>,
    store: Arc<dyn ContentStore>,
}

impl LocalizedReader {
    pub fn new(resolver: Arc<LocaleResolver>, store: Arc<dyn ContentStore>) -> Self {
        Self { resolver, store }
    }

    /// Row of `contentful_id` for locale `code`, completed from its fallback
    /// chain. Denylisted locales have no row of their own and are served
    /// entirely from their fallbacks. `None` when no locale in the chain has
    /// a row.
    pub async fn find(
        &self,
        table: &str,
        contentful_id: &str,
        code: &str,
    ) -> Result<Option<EntryRow>, StoreError> {
        let (country, locale) = self.resolver.split(code);
        let mut resolved = self
            .store
            .find_entry(table, contentful_id, &country, &locale)
            .await?;

        let mut visited = HashSet::from([code.to_string()]);
        let mut next = self.resolver.fallback(code).await?;
        while !next.is_empty() && visited.insert(next.clone()) {
            let (fb_country, fb_locale) = self.resolver.split(&next);
            if let Some(fallback_row) = self
                .store
                .find_entry(table, contentful_id, &fb_country, &fb_locale)
                .await?
            {
                debug!(contentful_id, code, fallback = %next, "Completing row from fallback locale");
                let row = resolved.get_or_insert_with(|| EntryRow {
                    contentful_id: contentful_id.to_string(),
                    locale: locale.clone(),
                    country: country.clone(),
                    fields: Default::default(),
                });
                for (name, value) in fallback_row.fields {
                    row.fields.entry(name).or_insert(value);
                }
            }
            next = self.resolver.fallback(&next).await?;
        }

        Ok(resolved)
    }
}
