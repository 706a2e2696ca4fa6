//! Google Cloud Storage document store (JSON API).

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, trace};

use sismica_core::{
    defaults, Document, DocumentStore, EndpointConfig, Error, Result, TokenProvider,
};

/// Configuration for the GCS client.
#[derive(Debug, Clone)]
pub struct GcsConfig {
    /// API root, without the `/storage/v1` suffix.
    pub base_url: String,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for GcsConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::GCS_BASE_URL.to_string(),
            timeout_seconds: defaults::BACKEND_TIMEOUT_SECS,
        }
    }
}

impl GcsConfig {
    pub fn from_endpoints(endpoints: &EndpointConfig) -> Self {
        Self {
            base_url: endpoints.gcs_base_url.clone(),
            timeout_seconds: endpoints.gcs_timeout_secs,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListObjectsResponse {
    #[serde(default)]
    items: Vec<ObjectResource>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectResource {
    name: String,
}

pub struct GcsDocumentStore {
    client: Client,
    config: GcsConfig,
    auth: Arc<dyn TokenProvider>,
}

impl GcsDocumentStore {
    pub fn new(config: GcsConfig, auth: Arc<dyn TokenProvider>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Storage(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            config,
            auth,
        })
    }

    fn bucket_url(&self, bucket: &str) -> String {
        format!(
            "{}/storage/v1/b/{}/o",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(bucket)
        )
    }
}

/// Turn a non-success GCS response into an error, keeping 404 distinct.
async fn status_error(response: reqwest::Response, what: &str) -> Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if status == StatusCode::NOT_FOUND {
        Error::NotFound(what.to_string())
    } else {
        Error::Storage(format!("GCS returned {} for {}: {}", status, what, body))
    }
}

#[async_trait]
impl DocumentStore for GcsDocumentStore {
    async fn fetch(&self, bucket: &str, path: &str) -> Result<Document> {
        let start = Instant::now();
        let url = format!("{}/{}", self.bucket_url(bucket), urlencoding::encode(path));
        let token = self.auth.access_token().await?;

        let response = self
            .client
            .get(&url)
            .query(&[("alt", "media")])
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| Error::Storage(format!("Download request failed: {}", e)))?;

        let what = format!("gs://{}/{}", bucket, path);
        if !response.status().is_success() {
            return Err(status_error(response, &what).await);
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults::FALLBACK_CONTENT_TYPE)
            .to_string();

        let data = response
            .bytes()
            .await
            .map_err(|e| Error::Storage(format!("Failed to read {}: {}", what, e)))?
            .to_vec();

        debug!(
            subsystem = "store",
            component = "gcs",
            op = "fetch",
            bucket,
            archivo = path,
            document_bytes = data.len(),
            content_type = %content_type,
            duration_ms = start.elapsed().as_millis() as u64,
            "Downloaded object"
        );

        Ok(Document::new(data, content_type))
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        let url = self.bucket_url(bucket);
        let mut names = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let token = self.auth.access_token().await?;
            let mut request = self
                .client
                .get(&url)
                .query(&[("prefix", prefix), ("fields", "items(name),nextPageToken")])
                .bearer_auth(token);
            if let Some(ref page) = page_token {
                request = request.query(&[("pageToken", page.as_str())]);
            }

            let response = request
                .send()
                .await
                .map_err(|e| Error::Storage(format!("List request failed: {}", e)))?;

            if !response.status().is_success() {
                return Err(status_error(response, &format!("gs://{}", bucket)).await);
            }

            let page: ListObjectsResponse = response.json().await.map_err(|e| {
                Error::Storage(format!("Failed to parse object listing: {}", e))
            })?;

            trace!(
                subsystem = "store",
                component = "gcs",
                op = "list",
                bucket,
                result_count = page.items.len(),
                "Listed page"
            );
            names.extend(page.items.into_iter().map(|o| o.name));

            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }

        debug!(
            subsystem = "store",
            component = "gcs",
            op = "list",
            bucket,
            prefix,
            result_count = names.len(),
            "Listed objects"
        );
        Ok(names)
    }

    fn name(&self) -> &str {
        "gcs"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sismica_core::StaticTokenProvider;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store(server: &MockServer) -> GcsDocumentStore {
        GcsDocumentStore::new(
            GcsConfig {
                base_url: server.uri(),
                timeout_seconds: 5,
            },
            Arc::new(StaticTokenProvider::new("test-token")),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_returns_bytes_and_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/storage/v1/b/sismica/o/lineas%2F2024%2Fl-01.pdf"))
            .and(query_param("alt", "media"))
            .and(header("Authorization", "Bearer test-token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "application/pdf")
                    .set_body_bytes(b"%PDF-1.4 body".to_vec()),
            )
            .expect(1)
            .mount(&server)
            .await;

        let doc = store(&server)
            .fetch("sismica", "lineas/2024/l-01.pdf")
            .await
            .unwrap();
        assert_eq!(doc.content_type, "application/pdf");
        assert_eq!(doc.data, b"%PDF-1.4 body");
    }

    #[tokio::test]
    async fn test_fetch_missing_object_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("No such object"))
            .mount(&server)
            .await;

        let err = store(&server).fetch("sismica", "missing.pdf").await.unwrap_err();
        match err {
            Error::NotFound(what) => assert_eq!(what, "gs://sismica/missing.pdf"),
            other => panic!("Expected NotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_permission_error_surfaces_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_string("denied"))
            .mount(&server)
            .await;

        let err = store(&server).fetch("sismica", "a.pdf").await.unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
        assert!(err.to_string().contains("403"));
    }

    #[tokio::test]
    async fn test_list_follows_page_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/storage/v1/b/sismica/o"))
            .and(query_param("prefix", "lineas/"))
            .and(query_param("pageToken", "p2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [{"name": "lineas/c.tif"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/storage/v1/b/sismica/o"))
            .and(query_param("prefix", "lineas/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [{"name": "lineas/a.pdf"}, {"name": "lineas/b.txt"}],
                "nextPageToken": "p2"
            })))
            .mount(&server)
            .await;

        let names = store(&server).list("sismica", "lineas/").await.unwrap();
        assert_eq!(names, vec!["lineas/a.pdf", "lineas/b.txt", "lineas/c.tif"]);
    }

    #[tokio::test]
    async fn test_list_empty_prefix_has_no_items() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/storage/v1/b/sismica/o"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let names = store(&server).list("sismica", "nothing/").await.unwrap();
        assert!(names.is_empty());
    }
}
