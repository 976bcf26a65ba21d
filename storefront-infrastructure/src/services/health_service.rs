use std::sync::Arc;

use async_trait::async_trait;
use storefront_domain::ports::{HealthCheckService, PrimaryEventStore, StoreStatus, SecondaryEventStore};

pub struct StoreHealthService {
    primary: Arc<dyn PrimaryEventStore>,
    secondary: Option<Arc<dyn SecondaryEventStore>>,
}

impl StoreHealthService {
    pub fn new(
        primary: Arc<dyn PrimaryEventStore>,
        secondary: Option<Arc<dyn SecondaryEventStore>>,
    ) -> Self {
        Self { primary, secondary }
    }
}

#[async_trait]
impl HealthCheckService for StoreHealthService {
    async fn check_primary(&self) -> anyhow::Result<bool> {
        self.primary.ping().await.map(|_| true)
    }

    async fn check_secondary(&self) -> anyhow::Result<StoreStatus> {
        let Some(secondary) = self.secondary.as_ref() else {
            return Ok(StoreStatus::Disabled);
        };
        secondary.ping().await.map(|_| StoreStatus::Connected)
    }
}
