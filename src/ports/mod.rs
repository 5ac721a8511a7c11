/// Ports between the scan pipeline and the outside world
///
/// Inbound: how transports hand over event envelopes.
/// Outbound: job platform, result stores, alert channels and time.
pub mod inbound;
pub mod outbound;
