//! Locale rows and the resolver that answers default/fallback questions.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::Cache;
use crate::config::ContentfulConfig;
use crate::contract::LocaleStore;
use crate::error::StoreError;

const DEFAULT_LOCALE_KEY: &str = "locale_default";
const DEFAULT_COUNTRY_KEY: &str = "country_default";
const FALLBACK_KEY_PREFIX: &str = "locale_fallback_";

/// Fallback codes are only cached briefly so edits made by the locale sync
/// job show up without an explicit invalidation.
pub const FALLBACK_TTL: Duration = Duration::from_secs(5 * 60);

/// A row of the `locales` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Locale {
    pub id: i64,
    pub label: String,
    /// Remote locale code, the key used inside payload `fields`.
    pub code: String,
    pub locale: String,
    pub country: String,
    pub fallback_code: Option<String>,
    pub is_default: bool,
    pub is_editable: bool,
    pub is_publishable: bool,
}

/// Splits a combined `country_locale` (or `country-locale`) key.
/// Keys without a separator are a bare locale in `default_country`.
pub fn split_locale_key(combined: &str, default_country: &str) -> (String, String) {
    for separator in ['_', '-'] {
        if combined.contains(separator) {
            let mut parts = combined.split(separator);
            let country = parts.next().unwrap_or_default().to_string();
            let locale = parts.next().unwrap_or_default().to_string();
            return (country, locale);
        }
    }
    (default_country.to_string(), combined.to_string())
}

/// `false` when `country_locale` is listed in `denylist`.
pub fn can_be_saved(denylist: &[String], country: &str, locale: &str) -> bool {
    let key = format!("{country}_{locale}");
    !denylist.iter().any(|denied| *denied == key)
}

/// Answers locale questions from the `locales` table through a cache.
///
/// Defaults are cached until [`LocaleResolver::invalidate`]; fallbacks for
/// [`FALLBACK_TTL`]. Two tasks missing the cache at once may both query the
/// store; they compute the same value so the last write wins harmlessly.
pub struct LocaleResolver {
    store: Arc<dyn LocaleStore>,
    cache: Arc<dyn Cache>,
    default_locale: String,
    default_country: String,
    not_flatten: Vec<String>,
}

impl LocaleResolver {
    pub fn new(store: Arc<dyn LocaleStore>, cache: Arc<dyn Cache>, config: &ContentfulConfig) -> Self {
        Self {
            store,
            cache,
            default_locale: config.default_locale.clone(),
            default_country: config.default_country.clone(),
            not_flatten: config.locales_not_flatten.clone(),
        }
    }

    pub async fn default_locale(&self) -> Result<String, StoreError> {
        if let Some(cached) = self.cache.get(DEFAULT_LOCALE_KEY) {
            return Ok(cached);
        }

        let resolved = match self.store.find_default().await? {
            Some(row) if !row.locale.is_empty() => row.locale,
            _ => self.default_locale.clone(),
        };
        debug!(locale = %resolved, "Resolved default locale");
        self.cache.put(DEFAULT_LOCALE_KEY, resolved.clone(), None);
        Ok(resolved)
    }

    pub async fn default_country(&self) -> Result<String, StoreError> {
        if let Some(cached) = self.cache.get(DEFAULT_COUNTRY_KEY) {
            return Ok(cached);
        }

        let resolved = match self.store.find_default().await? {
            Some(row) if !row.country.is_empty() => row.country,
            _ => self.default_country.clone(),
        };
        debug!(country = %resolved, "Resolved default country");
        self.cache.put(DEFAULT_COUNTRY_KEY, resolved.clone(), None);
        Ok(resolved)
    }

    /// Single-hop fallback for `code`. An empty string means there is no
    /// fallback and callers must stop looking.
    pub async fn fallback(&self, code: &str) -> Result<String, StoreError> {
        let key = format!("{FALLBACK_KEY_PREFIX}{code}");
        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached);
        }

        let fallback = self
            .store
            .find_by_code(code)
            .await?
            .and_then(|row| row.fallback_code)
            .unwrap_or_default();
        self.cache.put(&key, fallback.clone(), Some(FALLBACK_TTL));
        Ok(fallback)
    }

    pub fn can_be_saved(&self, country: &str, locale: &str) -> bool {
        can_be_saved(&self.not_flatten, country, locale)
    }

    pub fn split(&self, combined: &str) -> (String, String) {
        split_locale_key(combined, &self.default_country)
    }

    pub async fn all(&self) -> Result<Vec<Locale>, StoreError> {
        self.store.all().await
    }

    /// Drops every cached answer. Called after the `locales` table changes.
    pub fn invalidate(&self) {
        debug!("Invalidating locale cache");
        self.cache.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::contract::MockLocaleStore;

    fn config(not_flatten: &[&str]) -> ContentfulConfig {
        ContentfulConfig {
            default_locale: "en".into(),
            default_country: "us".into(),
            locales_not_flatten: not_flatten.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    fn default_row() -> Locale {
        Locale {
            id: 1,
            label: "French (France)".into(),
            code: "fr_FR".into(),
            locale: "FR".into(),
            country: "fr".into(),
            is_default: true,
            ..Default::default()
        }
    }

    #[test]
    fn split_handles_both_separators_and_bare_locales() {
        let expected = ("fr".to_string(), "FR".to_string());
        assert_eq!(split_locale_key("fr_FR", "us"), expected);
        assert_eq!(split_locale_key("fr-FR", "us"), expected);
        assert_eq!(split_locale_key("FR", "us"), ("us".to_string(), "FR".to_string()));
    }

    #[test]
    fn denylist_blocks_only_listed_pairs() {
        let denylist = vec!["fr_FR".to_string(), "be_NL".to_string()];
        assert!(!can_be_saved(&denylist, "fr", "FR"));
        assert!(can_be_saved(&denylist, "fr", "BE"));
        assert!(can_be_saved(&[], "fr", "FR"));
    }

    #[tokio::test]
    async fn default_locale_queries_the_store_once() {
        let mut store = MockLocaleStore::new();
        store
            .expect_find_default()
            .times(1)
            .returning(|| Ok(Some(default_row())));

        let resolver = LocaleResolver::new(Arc::new(store), Arc::new(MemoryCache::new()), &config(&[]));

        for _ in 0..5 {
            assert_eq!(resolver.default_locale().await.unwrap(), "FR");
        }
    }

    #[tokio::test]
    async fn default_country_has_its_own_cache_key() {
        let mut store = MockLocaleStore::new();
        store
            .expect_find_default()
            .times(2)
            .returning(|| Ok(Some(default_row())));

        let resolver = LocaleResolver::new(Arc::new(store), Arc::new(MemoryCache::new()), &config(&[]));

        for _ in 0..3 {
            assert_eq!(resolver.default_locale().await.unwrap(), "FR");
            assert_eq!(resolver.default_country().await.unwrap(), "fr");
        }
    }

    #[tokio::test]
    async fn defaults_fall_back_to_config() {
        let mut store = MockLocaleStore::new();
        store.expect_find_default().returning(|| Ok(None));

        let resolver = LocaleResolver::new(Arc::new(store), Arc::new(MemoryCache::new()), &config(&[]));

        assert_eq!(resolver.default_locale().await.unwrap(), "en");
        assert_eq!(resolver.default_country().await.unwrap(), "us");
    }

    #[tokio::test]
    async fn invalidate_forces_a_new_query() {
        let mut store = MockLocaleStore::new();
        store
            .expect_find_default()
            .times(2)
            .returning(|| Ok(Some(default_row())));

        let resolver = LocaleResolver::new(Arc::new(store), Arc::new(MemoryCache::new()), &config(&[]));

        resolver.default_locale().await.unwrap();
        resolver.default_locale().await.unwrap();
        resolver.invalidate();
        resolver.default_locale().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn fallback_is_cached_for_the_ttl() {
        let mut store = MockLocaleStore::new();
        store
            .expect_find_by_code()
            .withf(|code| code == "fr_BE")
            .times(2)
            .returning(|_| {
                Ok(Some(Locale {
                    code: "fr_BE".into(),
                    fallback_code: Some("fr_FR".into()),
                    ..Default::default()
                }))
            });

        let resolver = LocaleResolver::new(Arc::new(store), Arc::new(MemoryCache::new()), &config(&[]));

        assert_eq!(resolver.fallback("fr_BE").await.unwrap(), "fr_FR");
        assert_eq!(resolver.fallback("fr_BE").await.unwrap(), "fr_FR");

        tokio::time::advance(FALLBACK_TTL + Duration::from_secs(1)).await;
        assert_eq!(resolver.fallback("fr_BE").await.unwrap(), "fr_FR");
    }

    #[tokio::test]
    async fn fallback_is_empty_when_missing() {
        let mut store = MockLocaleStore::new();
        store.expect_find_by_code().returning(|code| {
            if code == "nl_NL" {
                Ok(Some(Locale {
                    code: "nl_NL".into(),
                    fallback_code: None,
                    ..Default::default()
                }))
            } else {
                Ok(None)
            }
        });

        let resolver = LocaleResolver::new(Arc::new(store), Arc::new(MemoryCache::new()), &config(&[]));

        assert_eq!(resolver.fallback("nl_NL").await.unwrap(), "");
        assert_eq!(resolver.fallback("xx_XX").await.unwrap(), "");
    }
}
