/// Adapters layer
///
/// Inbound: the Pub/Sub push endpoint. Outbound: Google Cloud, local
/// filesystem and subprocess, and in-memory implementations of the ports.
pub mod inbound;
pub mod outbound;
