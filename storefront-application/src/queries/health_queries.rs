use std::time::Duration;

use tokio::time::timeout;
use tracing::warn;

use crate::AppState;
use storefront_domain::{HealthReport, StoreStatus};

const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(2);

pub async fn health_report(state: &AppState) -> HealthReport {
    HealthReport {
        primary: primary_status(state).await,
        secondary: secondary_status(state).await,
    }
}

pub async fn primary_status(state: &AppState) -> StoreStatus {
    match timeout(HEALTH_CHECK_TIMEOUT, state.health.check_primary()).await {
        Ok(Ok(true)) => StoreStatus::Connected,
        Ok(Ok(false)) => StoreStatus::Disconnected,
        Ok(Err(err)) => {
            warn!("primary store health check failed: {:#}", err);
            StoreStatus::Disconnected
        }
        Err(_) => {
            warn!("primary store health check timed out");
            StoreStatus::Disconnected
        }
    }
}

async fn secondary_status(state: &AppState) -> StoreStatus {
    match timeout(HEALTH_CHECK_TIMEOUT, state.health.check_secondary()).await {
        Ok(Ok(status)) => status,
        Ok(Err(err)) => {
            warn!("secondary store health check failed: {:#}", err);
            StoreStatus::Disconnected
        }
        Err(_) => {
            warn!("secondary store health check timed out");
            StoreStatus::Disconnected
        }
    }
}
