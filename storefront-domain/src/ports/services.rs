use async_trait::async_trait;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreStatus {
    Connected,
    Disconnected,
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthReport {
    pub primary: StoreStatus,
    pub secondary: StoreStatus,
}

impl HealthReport {
    /// Only the primary store decides whether the service is usable.
    pub fn is_healthy(&self) -> bool {
        self.primary == StoreStatus::Connected
    }
}

#[async_trait]
pub trait HealthCheckService: Send + Sync {
    async fn check_primary(&self) -> anyhow::Result<bool>;
    async fn check_secondary(&self) -> anyhow::Result<StoreStatus>;
}
