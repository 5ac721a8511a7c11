/// Type alias for Result with anyhow::Error as the error type.
/// Classified failures are carried as `ScanTriggerError` inside the anyhow chain.
pub type Result<T> = std::result::Result<T, anyhow::Error>;
