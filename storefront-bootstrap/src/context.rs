use std::sync::Arc;

use anyhow::{Context, Result};
use clickhouse::Client;
use tracing::{info, warn};

use storefront_application::{AppState, Metrics};
use storefront_domain::ports::{OrderStore, PrimaryEventStore, SecondaryEventStore};
use storefront_domain::SecondaryDbConfig;
use storefront_infrastructure::{
    connect_pool, AppConfig, ClickhouseRepo, PostgresEventRepo, PostgresOrderRepo,
    StoreHealthService,
};

pub struct AppContext {
    pub config: AppConfig,
    pub state: AppState,
}

fn clickhouse_client(config: &SecondaryDbConfig) -> Client {
    let mut clickhouse = Client::default()
        .with_url(&config.url)
        .with_database(&config.database);
    if let Some(user) = &config.user {
        clickhouse = clickhouse.with_user(user);
    }
    if let Some(password) = &config.password {
        clickhouse = clickhouse.with_password(password);
    }
    if config.async_insert {
        clickhouse = clickhouse
            .with_option("async_insert", "1")
            .with_option("wait_for_async_insert", "0");
    }
    clickhouse
}

/// Builds the secondary store. A schema failure leaves it enabled; writes
/// will fail and be logged until the server comes back.
async fn secondary_store(config: &SecondaryDbConfig) -> Option<Arc<dyn SecondaryEventStore>> {
    if !config.enabled {
        info!("clickhouse disabled, events are written to postgres only");
        return None;
    }
    let repo = ClickhouseRepo::new(clickhouse_client(config), config.database.clone());
    match repo.ensure_schema().await {
        Ok(()) => info!("clickhouse schema ready at {}", config.url),
        Err(err) => warn!("clickhouse schema setup failed at {}: {:#}", config.url, err),
    }
    Some(Arc::new(repo))
}

impl AppContext {
    pub async fn new() -> Result<Self> {
        let config = AppConfig::load().await?;
        for warning in &config.load_warnings {
            warn!("{}", warning);
        }
        Self::from_config(config).await
    }

    pub async fn from_config(config: AppConfig) -> Result<Self> {
        let runtime_config = config.to_runtime_config();
        let primary_config = config.to_primary_config();

        let pool = connect_pool(&primary_config).await.with_context(|| {
            format!(
                "connecting to postgres at {}:{}/{}",
                primary_config.host, primary_config.port, primary_config.database
            )
        })?;
        let events = Arc::new(PostgresEventRepo::new(pool.clone()));
        events
            .ensure_schema()
            .await
            .context("creating analytics schema")?;
        let orders = Arc::new(PostgresOrderRepo::new(pool));
        orders.ensure_schema().await.context("creating order schema")?;
        info!("postgres schema ready");

        let secondary = secondary_store(&config.to_secondary_config()).await;
        let primary: Arc<dyn PrimaryEventStore> = events;
        let orders: Arc<dyn OrderStore> = orders;

        let state = AppState {
            config: runtime_config,
            health: Arc::new(StoreHealthService::new(primary.clone(), secondary.clone())),
            primary_events: primary,
            secondary_events: secondary,
            orders,
            metrics: Arc::new(Metrics::default()),
        };

        Ok(Self { config, state })
    }
}
