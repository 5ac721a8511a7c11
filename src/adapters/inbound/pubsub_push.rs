//! Pub/Sub push endpoint.
//!
//! The push subscription delivers one audit-log envelope per request. The
//! response status is the only signal back to the transport: any 2xx acks
//! the message, anything else makes Pub/Sub redeliver it.

use crate::ports::inbound::DeploymentEventPort;
use crate::scan_orchestration::services::MAX_ENVELOPE_BYTES;
use crate::shared::error::ScanTriggerError;
use crate::shared::Result;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
struct PushState {
    port: Arc<dyn DeploymentEventPort>,
    shutdown: CancellationToken,
}

/// Routes: `POST /` receives pushed events, `GET /healthz` answers probes.
///
/// Completed events and malformed envelopes both answer 204 so the message
/// is acked; redelivering a malformed envelope cannot succeed. An aborted
/// invocation answers 500 so the transport retries it.
pub fn push_router(port: Arc<dyn DeploymentEventPort>, shutdown: CancellationToken) -> Router {
    Router::new()
        .route("/", post(receive))
        .route("/healthz", get(healthz))
        // Oversized envelopes still reach the decoder and are rejected there
        .layer(DefaultBodyLimit::max(MAX_ENVELOPE_BYTES * 2))
        .with_state(PushState { port, shutdown })
}

/// Serves the router until `shutdown` is cancelled, then drains in-flight requests
pub async fn serve_push_endpoint(
    listener: TcpListener,
    router: Router,
    shutdown: CancellationToken,
) -> Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "listening for Pub/Sub push deliveries");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;
    tracing::info!("push endpoint stopped");
    Ok(())
}

async fn receive(State(state): State<PushState>, body: Bytes) -> StatusCode {
    let cancel = state.shutdown.child_token();
    match state.port.handle_event(&body, cancel).await {
        Ok(summary) => {
            tracing::info!(
                event_id = %summary.event_id,
                persisted = summary.persisted(),
                skipped = summary.skipped(),
                failed = summary.failed(),
                "push delivery acknowledged"
            );
            StatusCode::NO_CONTENT
        }
        Err(e) => match e.downcast_ref::<ScanTriggerError>() {
            Some(ScanTriggerError::MalformedEvent { .. }) => {
                tracing::warn!(error = %e, "dropping malformed push delivery");
                StatusCode::NO_CONTENT
            }
            _ => {
                tracing::error!(error = %format!("{:#}", e), "invocation aborted, requesting redelivery");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        },
    }
}

async fn healthz() -> &'static str {
    "ok"
}
