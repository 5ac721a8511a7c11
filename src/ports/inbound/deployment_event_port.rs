use crate::application::dto::EventSummary;
use crate::shared::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// DeploymentEventPort - Inbound port for deployment event processing
///
/// This port defines the interface that transport adapters (CLI, HTTP push
/// endpoint) use to hand a raw event envelope to the application.
#[async_trait]
pub trait DeploymentEventPort: Send + Sync {
    /// Processes one event envelope end to end
    ///
    /// # Arguments
    /// * `raw` - Envelope bytes exactly as delivered by the transport
    /// * `cancel` - Cancelled when the invocation must stop waiting on jobs
    ///
    /// # Returns
    /// A summary with one outcome per distinct image once every image has
    /// reached a terminal state
    ///
    /// # Errors
    /// Returns a `MalformedEvent` error if the envelope cannot be decoded,
    /// or any unhandled error that should make the transport retry.
    /// Per-image failures are reported in the summary, not as errors.
    async fn handle_event(&self, raw: &[u8], cancel: CancellationToken) -> Result<EventSummary>;
}
