use std::sync::Arc;

use contentful_sync_core::cache::MemoryCache;
use contentful_sync_core::config::ContentfulConfig;
use contentful_sync_core::contract::{
    ContentStore, LocaleStore, MockLocaleApi, MockSyncApi, ReleaseStore, RemoteLocale,
    StagingStore, SyncType,
};
use contentful_sync_core::error::SyncApiError;
use contentful_sync_core::locale::{Locale, LocaleResolver};
use contentful_sync_core::materializer::Materializer;
use contentful_sync_core::store::SqliteStore;
use contentful_sync_core::synchronise::{flatten, sync_data, sync_locales, ASSET_TYPE};
use mockall::predicate::eq;
use serde_json::{json, Value};

fn asset(id: &str) -> Value {
    json!({
        "sys": { "id": id, "type": "Asset" },
        "fields": {
            "title": { "fr_FR": format!("Asset {id}") },
            "file": { "fr_FR": { "url": format!("//images.ctfassets.net/s/{id}.jpg"), "fileName": format!("{id}.jpg") } }
        }
    })
}

fn entry(id: &str, content_type: &str) -> Value {
    json!({
        "sys": {
            "id": id,
            "type": "Entry",
            "contentType": { "sys": { "type": "Link", "linkType": "ContentType", "id": content_type } }
        },
        "fields": { "title": { "fr_FR": format!("Title {id}") } }
    })
}

fn resolver(store: &Arc<SqliteStore>) -> Arc<LocaleResolver> {
    Arc::new(LocaleResolver::new(
        store.clone(),
        Arc::new(MemoryCache::new()),
        &ContentfulConfig::default(),
    ))
}

#[tokio::test]
async fn stages_every_asset_page_until_an_empty_page() {
    let store = SqliteStore::in_memory().await.unwrap();

    let mut api = MockSyncApi::new();
    api.expect_sync_initial()
        .with(eq(SyncType::Asset))
        .times(1)
        .returning(|_| Ok(vec![asset("a1"), asset("a2")]));
    api.expect_sync_initial()
        .with(eq(SyncType::Entry))
        .times(1)
        .returning(|_| Ok(vec![]));
    let mut pages = vec![vec![asset("a3")], vec![]].into_iter();
    api.expect_sync_next()
        .times(2)
        .returning(move || Ok(pages.next().unwrap_or_default()));

    let report = sync_data(&mut api, &store, &store).await.unwrap();

    assert_eq!(report.assets.pages, 2);
    assert_eq!(report.assets.staged, 3);
    assert!(report.assets.is_complete() && report.entries.is_complete());

    let staged = store.staged().await.unwrap();
    assert_eq!(staged.len(), 3);
    assert!(staged.iter().all(|row| row.contentful_type == ASSET_TYPE));
    let ids: Vec<_> = staged.iter().map(|row| row.contentful_id.as_str()).collect();
    assert_eq!(ids, vec!["a1", "a2", "a3"]);
}

#[tokio::test]
async fn transport_failure_only_aborts_its_own_type() {
    let store = SqliteStore::in_memory().await.unwrap();
    store
        .insert_page(&[contentful_sync_core::contract::SyncEntry {
            contentful_id: "stale".into(),
            contentful_type: "article".into(),
            payload: "{}".into(),
        }])
        .await
        .unwrap();

    let mut api = MockSyncApi::new();
    api.expect_sync_initial()
        .with(eq(SyncType::Asset))
        .returning(|_| Ok(vec![asset("a1")]));
    api.expect_sync_initial()
        .with(eq(SyncType::Entry))
        .returning(|_| Ok(vec![entry("e1", "article"), json!({ "sys": { "id": "broken" } })]));
    let mut calls = 0;
    api.expect_sync_next().returning(move || {
        calls += 1;
        match calls {
            1 => Err(SyncApiError::Transport("connection reset".into())),
            _ => Ok(vec![]),
        }
    });

    let report = sync_data(&mut api, &store, &store).await.unwrap();

    assert_eq!(report.assets.staged, 1);
    assert_eq!(report.assets.error.as_deref(), Some("transport error: connection reset"));
    assert_eq!(report.entries.staged, 1);
    assert_eq!(report.entries.skipped, 1);
    assert!(report.entries.is_complete());

    let staged = store.staged().await.unwrap();
    let types: Vec<_> = staged
        .iter()
        .map(|row| (row.contentful_id.as_str(), row.contentful_type.as_str()))
        .collect();
    assert_eq!(types, vec![("a1", "asset"), ("e1", "article")]);
    assert_eq!(store.current().await.unwrap(), vec![report.release]);
}

#[tokio::test]
async fn flatten_materializes_staged_payloads_idempotently() {
    let store = Arc::new(SqliteStore::in_memory().await.unwrap());
    store
        .replace_all(&[
            Locale {
                code: "fr_FR".into(),
                ..Default::default()
            },
            Locale {
                code: "fr_BE".into(),
                fallback_code: Some("fr_FR".into()),
                ..Default::default()
            },
        ])
        .await
        .unwrap();

    let mut api = MockSyncApi::new();
    api.expect_sync_initial()
        .with(eq(SyncType::Asset))
        .returning(|_| Ok(vec![asset("a1")]));
    api.expect_sync_initial()
        .with(eq(SyncType::Entry))
        .returning(|_| Ok(vec![entry("e1", "article"), entry("e2", "bad name")]));
    api.expect_sync_next().returning(|| Ok(vec![]));
    sync_data(&mut api, store.as_ref(), store.as_ref()).await.unwrap();

    let resolver = resolver(&store);
    let materializer = Materializer::new(resolver.clone(), store.clone());

    let first = flatten(store.as_ref(), &materializer, &resolver).await.unwrap();
    let rows_after_first = store.entry_rows("article", "e1").await.unwrap();
    let second = flatten(store.as_ref(), &materializer, &resolver).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.assets, 1);
    assert_eq!(first.entries, 1);
    assert_eq!(first.rows, 4);
    assert_eq!(first.failed.len(), 1);
    assert_eq!(first.failed[0].0, "e2");

    assert_eq!(store.entry_rows("article", "e1").await.unwrap(), rows_after_first);
    assert_eq!(rows_after_first.len(), 2);
    let assets = store.asset_rows("a1").await.unwrap();
    assert_eq!(assets.len(), 2);
    assert_eq!(assets[0].file_name.as_deref(), Some("a1.jpg"));
}

#[tokio::test]
async fn locale_sync_replaces_table_and_invalidates_cache() {
    let store = Arc::new(SqliteStore::in_memory().await.unwrap());
    store
        .replace_all(&[Locale {
            code: "en_US".into(),
            locale: "US".into(),
            country: "en".into(),
            is_default: true,
            ..Default::default()
        }])
        .await
        .unwrap();
    let resolver = resolver(&store);
    assert_eq!(resolver.default_locale().await.unwrap(), "US");

    let mut api = MockLocaleApi::new();
    api.expect_fetch_locales().times(1).returning(|| {
        Ok(vec![
            RemoteLocale {
                name: "French".into(),
                code: "fr-FR".into(),
                fallback_code: None,
                default: true,
                content_management_api: true,
                content_delivery_api: true,
            },
            RemoteLocale {
                name: "Belgian French".into(),
                code: "fr-BE".into(),
                fallback_code: Some("fr-FR".into()),
                default: false,
                content_management_api: true,
                content_delivery_api: false,
            },
        ])
    });

    let synced = sync_locales(&api, store.as_ref(), &resolver).await.unwrap();

    assert_eq!(synced.len(), 2);
    assert_eq!(resolver.default_locale().await.unwrap(), "FR");
    assert_eq!(resolver.default_country().await.unwrap(), "fr");
    assert_eq!(resolver.fallback("fr-BE").await.unwrap(), "fr-FR");
    let be = store.find_by_code("fr-BE").await.unwrap().unwrap();
    assert!(be.is_editable && !be.is_publishable);
}
