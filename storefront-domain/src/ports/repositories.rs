use async_trait::async_trait;
use uuid::Uuid;

use crate::entities::{
    ClickStat, DeviceCount, EventRecord, EventTotals, InteractionFilter, NewOrder, NewOrderItem,
    Order, OrderItem, OrderSummary, PageVisitFilter, PageVisitStat, PageVisitTotals, ScrollStat,
    StatusChange, TimeWindow, TopPage, TrackedEvent,
};
use crate::value_objects::{EventKind, OrderStatus};

/// Authoritative event store. A write that fails here fails the request.
#[async_trait]
pub trait PrimaryEventStore: Send + Sync {
    async fn ensure_schema(&self) -> anyhow::Result<()>;
    async fn insert_event(&self, event: &TrackedEvent) -> anyhow::Result<()>;
    async fn find_event(&self, kind: EventKind, event_id: Uuid) -> anyhow::Result<Option<EventRecord>>;
    async fn page_visit_stats(&self, filter: &PageVisitFilter) -> anyhow::Result<Vec<PageVisitStat>>;
    async fn page_visit_totals(&self, window: &TimeWindow) -> anyhow::Result<PageVisitTotals>;
    async fn event_totals(&self, window: &TimeWindow) -> anyhow::Result<EventTotals>;
    async fn top_pages(&self, window: &TimeWindow, limit: i64) -> anyhow::Result<Vec<TopPage>>;
    async fn device_breakdown(&self, window: &TimeWindow) -> anyhow::Result<Vec<DeviceCount>>;
    async fn click_stats(&self, filter: &InteractionFilter) -> anyhow::Result<Vec<ClickStat>>;
    async fn scroll_stats(&self, filter: &InteractionFilter) -> anyhow::Result<Vec<ScrollStat>>;
    async fn ping(&self) -> anyhow::Result<()>;
}

/// Best-effort columnar mirror. Failures are logged and counted, never surfaced.
#[async_trait]
pub trait SecondaryEventStore: Send + Sync {
    async fn ensure_schema(&self) -> anyhow::Result<()>;
    async fn insert_event(&self, event: &TrackedEvent) -> anyhow::Result<()>;
    async fn page_visit_stats(&self, filter: &PageVisitFilter) -> anyhow::Result<Vec<PageVisitStat>>;
    async fn click_stats(&self, filter: &InteractionFilter) -> anyhow::Result<Vec<ClickStat>>;
    async fn scroll_stats(&self, filter: &InteractionFilter) -> anyhow::Result<Vec<ScrollStat>>;
    async fn ping(&self) -> anyhow::Result<()>;
}

/// One open unit of work against the order tables. Dropping it without
/// `commit` must leave no trace of the writes made through it.
#[async_trait]
pub trait OrderTransaction: Send {
    async fn insert_order(&mut self, order: &NewOrder, order_number: &str) -> anyhow::Result<Order>;
    /// `position` is the zero-based index of the line in the submitted order;
    /// reads return lines sorted by it.
    async fn insert_item(
        &mut self,
        order_id: Uuid,
        position: i32,
        item: &NewOrderItem,
    ) -> anyhow::Result<OrderItem>;
    async fn commit(self: Box<Self>) -> anyhow::Result<()>;
    async fn rollback(self: Box<Self>) -> anyhow::Result<()>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn ensure_schema(&self) -> anyhow::Result<()>;
    async fn begin(&self) -> anyhow::Result<Box<dyn OrderTransaction>>;
    async fn find_order(&self, id: Uuid) -> anyhow::Result<Option<Order>>;
    async fn list_user_orders(&self, user_id: &str) -> anyhow::Result<Vec<Order>>;
    async fn list_orders(
        &self,
        status: Option<OrderStatus>,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<(Vec<OrderSummary>, i64)>;
    /// Sets the status only while the current one is in `from` (any status
    /// when `from` is empty). `None` means no row matched.
    async fn update_status(
        &self,
        id: Uuid,
        status: OrderStatus,
        from: &[OrderStatus],
    ) -> anyhow::Result<Option<StatusChange>>;
    async fn ping(&self) -> anyhow::Result<()>;
}
