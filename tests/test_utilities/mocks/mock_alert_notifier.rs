use async_trait::async_trait;
use cloudrun_scan_trigger::prelude::*;
use std::sync::Mutex;

/// Mock AlertNotifier that keeps every alert it receives
#[derive(Default)]
pub struct RecordingNotifier {
    pub alerts: Mutex<Vec<SecurityAlert>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<SecurityAlert> {
        self.alerts.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertNotifier for RecordingNotifier {
    async fn notify(&self, alert: &SecurityAlert) -> Result<()> {
        self.alerts.lock().unwrap().push(alert.clone());
        Ok(())
    }
}
