use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Metrics {
    tracked_events: AtomicU64,
    validation_rejections: AtomicU64,
    primary_failures: AtomicU64,
    mirror_successes: AtomicU64,
    mirror_failures: AtomicU64,
    mirror_timeouts: AtomicU64,
    secondary_read_fallbacks: AtomicU64,
    orders_created: AtomicU64,
    order_failures: AtomicU64,
}

impl Metrics {
    pub fn record_tracked_event(&self) {
        self.tracked_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_validation_rejection(&self) {
        self.validation_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_primary_failure(&self) {
        self.primary_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_mirror_success(&self) {
        self.mirror_successes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_mirror_failure(&self) {
        self.mirror_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_mirror_timeout(&self) {
        self.mirror_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_secondary_read_fallback(&self) {
        self.secondary_read_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_order_created(&self) {
        self.orders_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_order_failure(&self) {
        self.order_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn tracked_events(&self) -> u64 {
        self.tracked_events.load(Ordering::Relaxed)
    }

    pub fn mirror_failures(&self) -> u64 {
        self.mirror_failures.load(Ordering::Relaxed)
    }

    pub fn mirror_timeouts(&self) -> u64 {
        self.mirror_timeouts.load(Ordering::Relaxed)
    }

    pub fn secondary_read_fallbacks(&self) -> u64 {
        self.secondary_read_fallbacks.load(Ordering::Relaxed)
    }

    pub fn render_prometheus(&self) -> String {
        let counters = [
            ("storefront_tracked_events_total", &self.tracked_events),
            ("storefront_validation_rejections_total", &self.validation_rejections),
            ("storefront_primary_failures_total", &self.primary_failures),
            ("storefront_mirror_successes_total", &self.mirror_successes),
            ("storefront_mirror_failures_total", &self.mirror_failures),
            ("storefront_mirror_timeouts_total", &self.mirror_timeouts),
            ("storefront_secondary_read_fallbacks_total", &self.secondary_read_fallbacks),
            ("storefront_orders_created_total", &self.orders_created),
            ("storefront_order_failures_total", &self.order_failures),
        ];

        counters
            .iter()
            .map(|(name, counter)| {
                format!(
                    "# TYPE {name} counter\n{name} {}\n",
                    counter.load(Ordering::Relaxed)
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_every_counter_in_prometheus_text() {
        let metrics = Metrics::default();
        metrics.record_tracked_event();
        metrics.record_tracked_event();
        metrics.record_mirror_timeout();

        let text = metrics.render_prometheus();
        assert!(text.contains("# TYPE storefront_tracked_events_total counter\n"));
        assert!(text.contains("storefront_tracked_events_total 2\n"));
        assert!(text.contains("storefront_mirror_timeouts_total 1\n"));
        assert!(text.contains("storefront_order_failures_total 0\n"));
    }
}
