use super::client::{api_error, send, GoogleApiClient};
use crate::ports::outbound::BlobStore;
use crate::shared::Result;
use async_trait::async_trait;
use reqwest::StatusCode;

/// Cloud Storage adapter for raw scanner reports
///
/// Objects are uploaded with the JSON API's simple media upload and read
/// back with `alt=media`. Object names are the relative blob paths
/// produced by the persistence writer.
#[derive(Debug, Clone)]
pub struct GcsBlobStore {
    client: GoogleApiClient,
    bucket: String,
    endpoint: String,
}

impl GcsBlobStore {
    const DEFAULT_ENDPOINT: &'static str = "https://storage.googleapis.com";

    pub fn new(client: GoogleApiClient, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            endpoint: Self::DEFAULT_ENDPOINT.to_string(),
        }
    }

    /// Overrides the API endpoint (emulators, tests)
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// `gs://` URI of an object, for log messages
    pub fn gs_uri(&self, path: &str) -> String {
        format!("gs://{}/{}", self.bucket, path)
    }

    fn upload_url(&self, path: &str) -> String {
        format!(
            "{}/upload/storage/v1/b/{}/o?uploadType=media&name={}",
            self.endpoint,
            urlencoding::encode(&self.bucket),
            urlencoding::encode(path)
        )
    }

    fn download_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/b/{}/o/{}?alt=media",
            self.endpoint,
            urlencoding::encode(&self.bucket),
            urlencoding::encode(path)
        )
    }
}

#[async_trait]
impl BlobStore for GcsBlobStore {
    async fn put(&self, path: &str, content_type: &str, body: Vec<u8>) -> Result<()> {
        let operation = format!("upload {}", self.gs_uri(path));
        let request = self
            .client
            .post(&self.upload_url(path))
            .await?
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body);
        let response = send(request, &operation).await?;
        if !response.status().is_success() {
            return Err(api_error(response, &operation).await);
        }
        tracing::debug!(uri = %self.gs_uri(path), "blob uploaded");
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let operation = format!("download {}", self.gs_uri(path));
        let request = self.client.get(&self.download_url(path)).await?;
        let response = send(request, &operation).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let bytes = response.bytes().await?;
                Ok(Some(bytes.to_vec()))
            }
            _ => Err(api_error(response, &operation).await),
        }
    }
}
