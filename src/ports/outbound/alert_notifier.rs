use crate::scan_orchestration::domain::SecurityAlert;
use crate::shared::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// AlertNotifier port for security alerts
///
/// Delivery failures are reported to the caller, which logs them; a failed
/// notification never fails the scan it belongs to.
#[async_trait]
pub trait AlertNotifier: Send + Sync {
    async fn notify(&self, alert: &SecurityAlert) -> Result<()>;
}

#[async_trait]
impl<T: AlertNotifier + ?Sized> AlertNotifier for Arc<T> {
    async fn notify(&self, alert: &SecurityAlert) -> Result<()> {
        (**self).notify(alert).await
    }
}
