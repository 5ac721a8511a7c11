//! Google Cloud adapters (Cloud Run Jobs, Cloud Logging, Cloud Storage,
//! Firestore, Pub/Sub) over their REST APIs.

mod client;
mod cloud_run_jobs;
mod cloud_storage;
mod firestore;
mod pubsub;

pub use client::GoogleApiClient;
pub use cloud_run_jobs::{CloudRunJobRunner, CloudRunJobsConfig};
pub use cloud_storage::GcsBlobStore;
pub use firestore::{FirestoreMetadataStore, METADATA_COLLECTION};
pub use pubsub::PubSubNotifier;

/// Minimal HTTP server standing in for Google APIs in adapter tests.
#[cfg(test)]
pub(crate) mod fake_api {
    use axum::body::Bytes;
    use axum::extract::State;
    use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
    use axum::response::IntoResponse;
    use axum::Router;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone)]
    pub struct RecordedRequest {
        pub method: Method,
        /// Path and query as sent
        pub uri: String,
        pub authorization: Option<String>,
        pub body: Vec<u8>,
    }

    type Responder = Arc<dyn Fn(&RecordedRequest) -> (StatusCode, String) + Send + Sync>;

    #[derive(Clone)]
    struct FakeState {
        requests: Arc<Mutex<Vec<RecordedRequest>>>,
        responder: Responder,
    }

    pub struct FakeApi {
        pub base_url: String,
        requests: Arc<Mutex<Vec<RecordedRequest>>>,
    }

    impl FakeApi {
        pub async fn start<F>(responder: F) -> Self
        where
            F: Fn(&RecordedRequest) -> (StatusCode, String) + Send + Sync + 'static,
        {
            let requests = Arc::new(Mutex::new(Vec::new()));
            let state = FakeState {
                requests: requests.clone(),
                responder: Arc::new(responder),
            };
            let app = Router::new().fallback(handle).with_state(state);
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });
            Self {
                base_url: format!("http://{}", addr),
                requests,
            }
        }

        pub fn requests(&self) -> Vec<RecordedRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    async fn handle(
        State(state): State<FakeState>,
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        body: Bytes,
    ) -> impl IntoResponse {
        let request = RecordedRequest {
            method,
            uri: uri.to_string(),
            authorization: headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            body: body.to_vec(),
        };
        let (status, body) = (state.responder)(&request);
        state.requests.lock().unwrap().push(request);
        (status, [(header::CONTENT_TYPE, "application/json")], body)
    }
}
