/// Application layer - The deployment event pipeline
///
/// Drives each event from decoding through cache check, dispatch,
/// collection, persistence and alerting, talking to infrastructure only
/// through ports.
pub mod dto;
pub mod factories;
pub mod use_cases;
