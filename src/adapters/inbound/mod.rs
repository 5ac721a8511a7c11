/// Inbound adapters - Transports that deliver deployment events
pub mod pubsub_push;

pub use pubsub_push::{push_router, serve_push_endpoint};
