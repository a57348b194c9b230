//! Remote content API client
//!
//! Thin layer over [`Fetcher`] for the two JSON surfaces of the content API:
//! book metadata (`/api/v2/epubs/{id}/`) and the paginated files listing the
//! metadata points at. Authentication is a bearer token supplied per call by
//! the embedding application.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::fetch::Fetcher;
use crate::types::{BookId, BookMetadata, ManifestEntry, ManifestPage};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use std::time::Duration;
use url::Url;

/// Client for book metadata and manifest listings
#[derive(Clone, Debug)]
pub struct ApiClient {
    fetcher: Fetcher,
    api_base: String,
    page_delay: Duration,
}

impl ApiClient {
    /// Create a client from the library configuration and a shared fetcher
    ///
    /// Fails when the configured base URL does not parse.
    pub fn new(config: &Config, fetcher: Fetcher) -> Result<Self> {
        let base = Url::parse(&config.api_base)?;
        Ok(Self {
            fetcher,
            api_base: base.as_str().trim_end_matches('/').to_string(),
            page_delay: config.page_delay,
        })
    }

    /// Fetch book metadata together with the raw JSON it was parsed from
    ///
    /// On a non-success response for a `:book:` URN, retries once against the
    /// `:article:` variant of the same id before failing with
    /// [`Error::MetadataUnavailable`]. The raw value is persisted alongside
    /// the parsed fields so a cached book can be re-used without re-fetching.
    pub async fn get_metadata(
        &self,
        id: &BookId,
        token: &str,
    ) -> Result<(BookMetadata, serde_json::Value)> {
        match self.fetch_metadata(id, token).await {
            Ok(metadata) => Ok(metadata),
            Err(primary) => {
                if let Some(article_id) = id.article_variant() {
                    tracing::info!(
                        %id,
                        alternate = %article_id,
                        "metadata fetch failed, trying article variant"
                    );
                    self.fetch_metadata(&article_id, token)
                        .await
                        .map_err(|_| Error::MetadataUnavailable {
                            id: id.to_string(),
                            reason: primary.to_string(),
                        })
                } else {
                    Err(Error::MetadataUnavailable {
                        id: id.to_string(),
                        reason: primary.to_string(),
                    })
                }
            }
        }
    }

    async fn fetch_metadata(
        &self,
        id: &BookId,
        token: &str,
    ) -> Result<(BookMetadata, serde_json::Value)> {
        let url = format!("{}/api/v2/epubs/{}/", self.api_base, id);
        let raw: serde_json::Value = self.fetcher.fetch_json(&url, api_headers(token)?).await?;
        let metadata: BookMetadata = serde_json::from_value(raw.clone())?;
        Ok((metadata, raw))
    }

    /// Walk the paginated files listing into one ordered manifest
    ///
    /// Follows `next` links until the final page, sleeping `page_delay`
    /// between pages as rate-limit courtesy.
    pub async fn collect_manifest(
        &self,
        first_url: &str,
        token: &str,
    ) -> Result<Vec<ManifestEntry>> {
        let mut entries = Vec::new();
        let mut next_url = Some(first_url.to_string());

        while let Some(url) = next_url {
            let page: ManifestPage = self.fetcher.fetch_json(&url, api_headers(token)?).await?;
            entries.extend(page.results);
            next_url = page.next;

            if next_url.is_some() {
                tokio::time::sleep(self.page_delay).await;
            }
        }

        tracing::debug!(files = entries.len(), "manifest collected");
        Ok(entries)
    }

    /// Fetch one manifest file's content (text or bytes per content-type)
    pub async fn fetch_file(&self, url: &str, token: &str) -> Result<crate::types::FileBody> {
        self.fetcher.fetch(url, file_headers(token)?).await
    }
}

/// Headers for JSON API calls
fn api_headers(token: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(AUTHORIZATION, bearer(token)?);
    Ok(headers)
}

/// Headers for raw file fetches
fn file_headers(token: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    headers.insert(AUTHORIZATION, bearer(token)?);
    Ok(headers)
}

fn bearer(token: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|e| Error::Other(format!("invalid auth token: {e}")))
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> ApiClient {
        let config = Config {
            api_base: server.uri(),
            page_delay: Duration::from_millis(1),
            retry: RetryConfig {
                max_retries: 1,
                base_delay: Duration::from_millis(5),
                max_delay: Duration::from_millis(10),
            },
            ..Config::default()
        };
        let fetcher = Fetcher::new(config.retry.clone());
        ApiClient::new(&config, fetcher).unwrap()
    }

    fn metadata_body(files_url: &str) -> serde_json::Value {
        serde_json::json!({
            "title": "Example Book",
            "isbn": "9781492051",
            "ourn": "urn:orm:book:9781492051",
            "files": files_url,
        })
    }

    #[tokio::test]
    async fn fetches_metadata_with_auth_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/epubs/urn:orm:book:9781492051/"))
            .and(header("authorization", "Bearer token-123"))
            .and(header("accept", "application/json"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(metadata_body("https://x/files/")),
            )
            .expect(1)
            .mount(&server)
            .await;

        let (metadata, raw) = client(&server)
            .get_metadata(&BookId::new("urn:orm:book:9781492051"), "token-123")
            .await
            .unwrap();
        assert_eq!(metadata.title, "Example Book");
        assert_eq!(metadata.ourn.as_deref(), Some("urn:orm:book:9781492051"));
        assert_eq!(raw["isbn"], "9781492051");
    }

    #[tokio::test]
    async fn falls_back_to_article_variant() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/epubs/urn:orm:book:42/"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v2/epubs/urn:orm:article:42/"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(metadata_body("https://x/files/")),
            )
            .expect(1)
            .mount(&server)
            .await;

        let (metadata, _) = client(&server)
            .get_metadata(&BookId::new("urn:orm:book:42"), "t")
            .await
            .unwrap();
        assert_eq!(metadata.title, "Example Book");
    }

    #[tokio::test]
    async fn metadata_unavailable_after_both_variants_fail() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = client(&server)
            .get_metadata(&BookId::new("urn:orm:book:42"), "t")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MetadataUnavailable { .. }));
    }

    #[tokio::test]
    async fn plain_id_has_no_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/epubs/9781492051/"))
            .respond_with(ResponseTemplate::new(403))
            // 403 is permanent and a plain id has no alternate form: one call
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server)
            .get_metadata(&BookId::new("9781492051"), "t")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MetadataUnavailable { .. }));
    }

    #[tokio::test]
    async fn collects_manifest_across_pages() {
        let server = MockServer::start().await;
        let page2_url = format!("{}/files/?page=2", server.uri());

        // The page-2 matcher is more specific, so mount it first
        Mock::given(method("GET"))
            .and(path("/files/"))
            .and(wiremock::matchers::query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [
                    {"full_path": "ch2.html", "url": "https://x/ch2",
                     "media_type": "text/html", "kind": "chapter"},
                ],
                "next": null,
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/files/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [
                    {"full_path": "content.opf", "url": "https://x/opf",
                     "media_type": "application/oebps-package+xml", "kind": "opf"},
                    {"full_path": "ch1.html", "url": "https://x/ch1",
                     "media_type": "text/html", "kind": "chapter"},
                ],
                "next": page2_url,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let manifest = client(&server)
            .collect_manifest(&format!("{}/files/", server.uri()), "t")
            .await
            .unwrap();
        assert_eq!(manifest.len(), 3);
        assert_eq!(manifest[0].full_path, "content.opf");
        assert_eq!(manifest[2].full_path, "ch2.html");
    }
}
