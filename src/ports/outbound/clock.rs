use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Clock port so that cache freshness and scan ids can be tested with fixed time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

impl<T: Clock + ?Sized> Clock for Arc<T> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}
