use crate::shared::Result;
use anyhow::Context;
use gcp_auth::TokenProvider;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Where bearer tokens come from.
#[derive(Clone)]
enum Credentials {
    /// Application-default credentials (metadata server, workload identity, key file)
    Provider(Arc<dyn TokenProvider>),
    /// Fixed token, used against emulators and local fakes
    Static(String),
}

/// Authenticated HTTP client shared by the Google Cloud adapters
///
/// Wraps a `reqwest::Client` and attaches a fresh OAuth2 bearer token to
/// every request. Token caching and refresh are handled by `gcp_auth`.
#[derive(Clone)]
pub struct GoogleApiClient {
    http: reqwest::Client,
    credentials: Credentials,
}

impl std::fmt::Debug for GoogleApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let credentials = match self.credentials {
            Credentials::Provider(_) => "<TokenProvider>",
            Credentials::Static(_) => "<static>",
        };
        f.debug_struct("GoogleApiClient")
            .field("http", &self.http)
            .field("credentials", &credentials)
            .finish()
    }
}

impl GoogleApiClient {
    const TIMEOUT_SECONDS: u64 = 30;

    /// Discovers application-default credentials
    pub async fn from_environment() -> Result<Self> {
        let provider = gcp_auth::provider().await.context(
            "Failed to initialize Google Cloud credentials\n\n💡 Hint: Run on Cloud Run with a service account, or set GOOGLE_APPLICATION_CREDENTIALS",
        )?;
        Ok(Self {
            http: Self::build_http()?,
            credentials: Credentials::Provider(provider),
        })
    }

    /// Client that sends a fixed bearer token
    pub fn with_static_token(token: impl Into<String>) -> Result<Self> {
        Ok(Self {
            http: Self::build_http()?,
            credentials: Credentials::Static(token.into()),
        })
    }

    fn build_http() -> Result<reqwest::Client> {
        let user_agent = format!("cloudrun-scan-trigger/{}", env!("CARGO_PKG_VERSION"));
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(Self::TIMEOUT_SECONDS))
            .user_agent(user_agent)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(client)
    }

    async fn access_token(&self) -> Result<String> {
        match &self.credentials {
            Credentials::Provider(provider) => {
                let token = provider
                    .token(&[CLOUD_PLATFORM_SCOPE])
                    .await
                    .context("Failed to get Google Cloud access token")?;
                Ok(token.as_str().to_string())
            }
            Credentials::Static(token) => Ok(token.clone()),
        }
    }

    pub async fn get(&self, url: &str) -> Result<RequestBuilder> {
        Ok(self.http.get(url).bearer_auth(self.access_token().await?))
    }

    pub async fn post(&self, url: &str) -> Result<RequestBuilder> {
        Ok(self.http.post(url).bearer_auth(self.access_token().await?))
    }

    pub async fn delete(&self, url: &str) -> Result<RequestBuilder> {
        Ok(self.http.delete(url).bearer_auth(self.access_token().await?))
    }

    /// Sends the request and decodes a successful JSON response
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        operation: &str,
    ) -> Result<T> {
        let response = send(request, operation).await?;
        if !response.status().is_success() {
            return Err(api_error(response, operation).await);
        }
        response
            .json::<T>()
            .await
            .with_context(|| format!("{}: unexpected response body", operation))
    }
}

/// Sends the request, mapping transport failures to a contextual error
pub async fn send(request: RequestBuilder, operation: &str) -> Result<Response> {
    request
        .send()
        .await
        .with_context(|| format!("{}: request failed", operation))
}

#[derive(Debug, Deserialize)]
struct GoogleErrorResponse {
    error: GoogleError,
}

#[derive(Debug, Deserialize)]
struct GoogleError {
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// Converts a non-success response into an error carrying the API message
pub async fn api_error(response: Response, operation: &str) -> anyhow::Error {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "unknown error".to_string());
    describe_error(status, &body, operation)
}

fn describe_error(status: StatusCode, body: &str, operation: &str) -> anyhow::Error {
    match serde_json::from_str::<GoogleErrorResponse>(body) {
        Ok(parsed) => anyhow::anyhow!(
            "{} failed: {} ({})",
            operation,
            parsed.error.message,
            parsed.error.status.unwrap_or_else(|| status.to_string())
        ),
        Err(_) => anyhow::anyhow!("{} failed: {} - {}", operation, status, body.trim()),
    }
}
