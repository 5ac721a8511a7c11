use super::client::GoogleApiClient;
use crate::ports::outbound::AlertNotifier;
use crate::scan_orchestration::domain::SecurityAlert;
use crate::shared::Result;
use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;

/// Publishes security alerts to a Pub/Sub topic
///
/// The message data is the alert as JSON; attributes carry the threshold,
/// service and image so subscribers can filter without decoding.
#[derive(Debug, Clone)]
pub struct PubSubNotifier {
    client: GoogleApiClient,
    topic: String,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublishResponse {
    #[serde(default)]
    message_ids: Vec<String>,
}

impl PubSubNotifier {
    const DEFAULT_ENDPOINT: &'static str = "https://pubsub.googleapis.com/v1";

    /// `topic` is either a full `projects/<p>/topics/<t>` path or a topic id in `project_id`
    pub fn new(client: GoogleApiClient, project_id: &str, topic: &str) -> Self {
        let topic = if topic.starts_with("projects/") {
            topic.to_string()
        } else {
            format!("projects/{}/topics/{}", project_id, topic)
        };
        Self {
            client,
            topic,
            endpoint: Self::DEFAULT_ENDPOINT.to_string(),
        }
    }

    /// Overrides the API endpoint (emulators, tests)
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    fn publish_body(alert: &SecurityAlert) -> Result<serde_json::Value> {
        let data = base64::engine::general_purpose::STANDARD.encode(serde_json::to_vec(alert)?);
        Ok(json!({
            "messages": [{
                "data": data,
                "attributes": {
                    "type": "security_alert",
                    "threshold": alert.threshold.to_string(),
                    "service": alert.service_name,
                    "image": alert.image,
                }
            }]
        }))
    }
}

#[async_trait]
impl AlertNotifier for PubSubNotifier {
    async fn notify(&self, alert: &SecurityAlert) -> Result<()> {
        let operation = format!("publish alert to {}", self.topic);
        let url = format!("{}/{}:publish", self.endpoint, self.topic);
        let request = self
            .client
            .post(&url)
            .await?
            .json(&Self::publish_body(alert)?);
        let response: PublishResponse = self.client.send_json(request, &operation).await?;
        tracing::info!(
            topic = %self.topic,
            message_id = response.message_ids.first().map(String::as_str).unwrap_or(""),
            scan_id = %alert.scan_id,
            "security alert published"
        );
        Ok(())
    }
}
