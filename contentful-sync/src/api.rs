//! # Remote API client
//!
//! Implements the core [`SyncApi`] and [`LocaleApi`] traits against the
//! Content Delivery (or Preview) API over `reqwest`.
//!
//! - `sync_initial` opens a cursor with `initial=true&type=<kind>`.
//! - `sync_next` follows the `nextPageUrl` of the previous page. Once a page
//!   answers with `nextSyncUrl` instead, the cursor is exhausted and every
//!   further call returns an empty page.
//!
//! Transport and HTTP status failures map to [`SyncApiError::Transport`];
//! bodies that do not decode map to [`SyncApiError::Decode`].

use async_trait::async_trait;
use contentful_sync_core::contract::{LocaleApi, RemoteLocale, SyncApi, SyncType};
use contentful_sync_core::error::SyncApiError;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

pub const DELIVERY_HOST: &str = "https://cdn.contentful.com";
pub const PREVIEW_HOST: &str = "https://preview.contentful.com";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SyncPage {
    #[serde(default)]
    items: Vec<Value>,
    next_page_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LocalePage {
    #[serde(default)]
    items: Vec<RemoteLocale>,
}

pub struct ContentfulClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    next_page_url: Option<String>,
}

impl ContentfulClient {
    pub fn new(space_id: &str, environment: &str, token: &str, preview: bool) -> Self {
        let host = if preview { PREVIEW_HOST } else { DELIVERY_HOST };
        Self::with_host(host, space_id, environment, token)
    }

    pub fn with_host(host: &str, space_id: &str, environment: &str, token: &str) -> Self {
        let base_url = format!(
            "{}/spaces/{space_id}/environments/{environment}",
            host.trim_end_matches('/')
        );
        tracing::info!(base_url = %base_url, "Initialized Contentful client");
        Self {
            http: reqwest::Client::new(),
            base_url,
            token: token.to_string(),
            next_page_url: None,
        }
    }

    async fn get<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T, SyncApiError> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                tracing::error!(error = %e, "Contentful request failed");
                SyncApiError::Transport(e.to_string())
            })?;
        response
            .json::<T>()
            .await
            .map_err(|e| SyncApiError::Decode(e.to_string()))
    }

    async fn fetch_page(&mut self, request: reqwest::RequestBuilder) -> Result<Vec<Value>, SyncApiError> {
        let page: SyncPage = self.get(request).await?;
        tracing::debug!(items = page.items.len(), has_next = page.next_page_url.is_some(), "Fetched sync page");
        self.next_page_url = page.next_page_url;
        Ok(page.items)
    }
}

#[async_trait]
impl SyncApi for ContentfulClient {
    async fn sync_initial(&mut self, kind: SyncType) -> Result<Vec<Value>, SyncApiError> {
        self.next_page_url = None;
        let request = self
            .http
            .get(format!("{}/sync", self.base_url))
            .query(&[("initial", "true"), ("type", kind.as_str())]);
        self.fetch_page(request).await
    }

    async fn sync_next(&mut self) -> Result<Vec<Value>, SyncApiError> {
        let Some(url) = self.next_page_url.take() else {
            return Ok(Vec::new());
        };
        let request = self.http.get(url);
        self.fetch_page(request).await
    }
}

#[async_trait]
impl LocaleApi for ContentfulClient {
    async fn fetch_locales(&self) -> Result<Vec<RemoteLocale>, SyncApiError> {
        let request = self.http.get(format!("{}/locales", self.base_url));
        let page: LocalePage = self.get(request).await?;
        tracing::info!(locales = page.items.len(), "Fetched remote locales");
        Ok(page.items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn preview_selects_preview_host() {
        let client = ContentfulClient::new("space", "master", "t", true);
        assert_eq!(client.base_url, "https://preview.contentful.com/spaces/space/environments/master");
        let client = ContentfulClient::new("space", "staging", "t", false);
        assert_eq!(client.base_url, "https://cdn.contentful.com/spaces/space/environments/staging");
    }

    #[test]
    fn decodes_sync_pages() {
        let page: SyncPage = serde_json::from_value(json!({
            "sys": { "type": "Array" },
            "items": [{ "sys": { "id": "a1" } }],
            "nextPageUrl": "https://cdn.contentful.com/spaces/s/environments/master/sync?sync_token=abc"
        }))
        .unwrap();
        assert_eq!(page.items.len(), 1);
        assert!(page.next_page_url.unwrap().ends_with("sync_token=abc"));

        let last: SyncPage = serde_json::from_value(json!({
            "items": [],
            "nextSyncUrl": "https://cdn.contentful.com/spaces/s/environments/master/sync?sync_token=def"
        }))
        .unwrap();
        assert!(last.items.is_empty());
        assert_eq!(last.next_page_url, None);
    }

    #[tokio::test]
    async fn exhausted_cursor_returns_empty_page() {
        let mut client = ContentfulClient::new("space", "master", "t", false);
        assert!(client.sync_next().await.unwrap().is_empty());
    }

    #[test]
    fn decodes_locales() {
        let page: LocalePage = serde_json::from_value(json!({
            "items": [
                { "name": "French", "code": "fr-FR", "default": true, "fallbackCode": null },
                { "name": "Belgian French", "code": "fr-BE", "fallbackCode": "fr-FR" }
            ]
        }))
        .unwrap();
        assert_eq!(page.items.len(), 2);
        assert!(page.items[0].default);
        assert_eq!(page.items[1].fallback_code.as_deref(), Some("fr-FR"));
    }
}
