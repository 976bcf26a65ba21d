use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::time::timeout;
use tracing::warn;

use crate::AppState;
use storefront_domain::DataSource;

pub(crate) type StoreRead<'a, T> = Pin<Box<dyn Future<Output = anyhow::Result<T>> + Send + 'a>>;

/// Runs `secondary` within the secondary timeout. A failed or late secondary
/// read is counted as a fallback; `primary` then answers, as it does when no
/// secondary is configured.
pub(crate) async fn prefer_secondary<T>(
    state: &AppState,
    what: &str,
    secondary: Option<StoreRead<'_, T>>,
    primary: StoreRead<'_, T>,
) -> anyhow::Result<(T, DataSource)> {
    if let Some(read) = secondary {
        let budget = Duration::from_millis(state.config.secondary_timeout_ms);
        match timeout(budget, read).await {
            Ok(Ok(data)) => return Ok((data, DataSource::Secondary)),
            Ok(Err(err)) => warn!("secondary {} query failed, using primary: {:#}", what, err),
            Err(_) => warn!(
                "secondary {} query timed out after {}ms, using primary",
                what,
                budget.as_millis()
            ),
        }
        state.metrics.record_secondary_read_fallback();
    }
    Ok((primary.await?, DataSource::Primary))
}
