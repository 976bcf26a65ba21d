use std::sync::Arc;

use storefront_domain::ports::{HealthCheckService, OrderStore, PrimaryEventStore, SecondaryEventStore};
use storefront_domain::RuntimeConfig;

use crate::Metrics;

#[derive(Clone)]
pub struct AppState {
    pub config: RuntimeConfig,
    pub primary_events: Arc<dyn PrimaryEventStore>,
    /// `None` when mirroring is switched off.
    pub secondary_events: Option<Arc<dyn SecondaryEventStore>>,
    pub orders: Arc<dyn OrderStore>,
    pub health: Arc<dyn HealthCheckService>,
    pub metrics: Arc<Metrics>,
}
