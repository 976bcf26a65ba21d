// In-memory store fakes for application and HTTP tests

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::Utc;
use storefront_domain::ports::{
    HealthCheckService, OrderStore, OrderTransaction, PrimaryEventStore, StoreStatus,
    SecondaryEventStore,
};
use storefront_domain::{
    ClickStat, InteractionFilter, ScrollStat, DeviceCount, EventPayload, EventRecord, EventTotals, NewOrder, NewOrderItem, Order, OrderItem,
    OrderNumberTaken, OrderStatus, OrderSummary, PageVisitFilter, PageVisitStat, PageVisitTotals,
    PageVisit, PaymentStatus, RuntimeConfig, StatusChange, TimeWindow, TopPage, TrackedEvent,
    EventKind,
};
use uuid::Uuid;

use crate::{AppState, Metrics};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    Healthy,
    Failing,
    /// Every call waits forever; only a caller-side timeout gets out.
    Hanging,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct MemoryEventStore {
    mode: StoreMode,
    events: Mutex<Vec<TrackedEvent>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::with_mode(StoreMode::Healthy)
    }

    pub fn with_mode(mode: StoreMode) -> Self {
        Self {
            mode,
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<TrackedEvent> {
        lock(&self.events).clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.events).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn gate(&self) -> anyhow::Result<()> {
        match self.mode {
            StoreMode::Healthy => Ok(()),
            StoreMode::Failing => Err(anyhow!("store unavailable")),
            StoreMode::Hanging => std::future::pending().await,
        }
    }

    fn store(&self, event: &TrackedEvent) {
        lock(&self.events).push(event.clone());
    }

    fn visits_matching<'a>(
        events: &'a [TrackedEvent],
        mut keep: impl FnMut(&TrackedEvent) -> bool + 'a,
    ) -> impl Iterator<Item = (&'a TrackedEvent, &'a PageVisit)> + 'a {
        events.iter().filter_map(move |event| match &event.payload {
            EventPayload::PageVisit(visit) if keep(event) => Some((event, visit)),
            _ => None,
        })
    }

    fn stats(&self, filter: &PageVisitFilter) -> Vec<PageVisitStat> {
        type Key = (String, Option<String>, Option<String>, Option<String>);
        #[derive(Default)]
        struct Group {
            visits: u64,
            sessions: HashSet<String>,
            users: HashSet<String>,
            duration_total: i64,
        }

        let events = lock(&self.events);
        let mut groups: HashMap<Key, Group> = HashMap::new();
        let matching = Self::visits_matching(&events, |event| {
            filter.contains(event.occurred_at)
                && (filter.user_id.is_none() || event.user_id == filter.user_id)
        });
        for (event, visit) in matching {
            if let Some(path) = &filter.path {
                if &visit.path != path {
                    continue;
                }
            }
            let key = (
                visit.path.clone(),
                event.device_type().map(str::to_string),
                event.browser().map(str::to_string),
                visit.country.clone(),
            );
            let group = groups.entry(key).or_default();
            group.visits += 1;
            group.sessions.insert(event.session_id.clone());
            if let Some(user) = &event.user_id {
                group.users.insert(user.clone());
            }
            group.duration_total += i64::from(visit.duration_seconds);
        }

        let mut rows: Vec<PageVisitStat> = groups
            .into_iter()
            .map(|((path, device_type, browser, country), group)| PageVisitStat {
                path,
                visit_count: group.visits,
                unique_sessions: group.sessions.len() as u64,
                unique_users: group.users.len() as u64,
                avg_duration: group.duration_total as f64 / group.visits as f64,
                device_type,
                browser,
                country,
            })
            .collect();
        rows.sort_by(|a, b| b.visit_count.cmp(&a.visit_count).then_with(|| a.path.cmp(&b.path)));
        rows.into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .collect()
    }

    fn clicks(&self, filter: &InteractionFilter) -> Vec<ClickStat> {
        type Key = (
            chrono::NaiveDate,
            String,
            Option<String>,
            String,
            Option<String>,
            Option<String>,
        );
        #[derive(Default)]
        struct Group {
            clicks: u64,
            sessions: HashSet<String>,
            users: HashSet<String>,
        }

        let events = lock(&self.events);
        let mut groups: HashMap<Key, Group> = HashMap::new();
        for event in events.iter().filter(|event| filter.window.contains(event.occurred_at)) {
            let EventPayload::Click(click) = &event.payload else {
                continue;
            };
            let key = (
                event.occurred_at.date_naive(),
                click.element_type.clone(),
                click.element_id.clone(),
                click.page_url.clone(),
                event.device_type().map(str::to_string),
                event.browser().map(str::to_string),
            );
            let group = groups.entry(key).or_default();
            group.clicks += 1;
            group.sessions.insert(event.session_id.clone());
            if let Some(user) = &event.user_id {
                group.users.insert(user.clone());
            }
        }

        let mut rows: Vec<ClickStat> = groups
            .into_iter()
            .map(
                |((date, element_type, element_id, page_url, device_type, browser), group)| {
                    ClickStat {
                        date,
                        element_type,
                        element_id,
                        page_url,
                        click_count: group.clicks,
                        unique_sessions: group.sessions.len() as u64,
                        unique_users: group.users.len() as u64,
                        device_type,
                        browser,
                    }
                },
            )
            .collect();
        rows.sort_by(|a, b| {
            b.date
                .cmp(&a.date)
                .then_with(|| b.click_count.cmp(&a.click_count))
                .then_with(|| a.page_url.cmp(&b.page_url))
        });
        rows.truncate(filter.limit.max(0) as usize);
        rows
    }

    fn scrolls(&self, filter: &InteractionFilter) -> Vec<ScrollStat> {
        // f64 is not Hash, so the depth is keyed by its bits
        type Key = (chrono::NaiveDate, String, u64, Option<String>, Option<String>);
        #[derive(Default)]
        struct Group {
            events: u64,
            sessions: HashSet<String>,
            heights: Vec<i32>,
        }

        let events = lock(&self.events);
        let mut groups: HashMap<Key, Group> = HashMap::new();
        for event in events.iter().filter(|event| filter.window.contains(event.occurred_at)) {
            let EventPayload::Scroll(scroll) = &event.payload else {
                continue;
            };
            let key = (
                event.occurred_at.date_naive(),
                scroll.page_url.clone(),
                scroll.scroll_depth_percent.to_bits(),
                event.device_type().map(str::to_string),
                event.browser().map(str::to_string),
            );
            let group = groups.entry(key).or_default();
            group.events += 1;
            group.sessions.insert(event.session_id.clone());
            group.heights.extend(scroll.page_height);
        }

        let mut rows: Vec<ScrollStat> = groups
            .into_iter()
            .map(|((date, page_url, depth, device_type, browser), group)| {
                let avg_page_height = if group.heights.is_empty() {
                    None
                } else {
                    let total: i64 = group.heights.iter().map(|height| i64::from(*height)).sum();
                    Some(total as f64 / group.heights.len() as f64)
                };
                ScrollStat {
                    date,
                    page_url,
                    scroll_depth_percent: f64::from_bits(depth),
                    scroll_events: group.events,
                    unique_sessions: group.sessions.len() as u64,
                    avg_page_height,
                    device_type,
                    browser,
                }
            })
            .collect();
        rows.sort_by(|a, b| {
            b.date
                .cmp(&a.date)
                .then_with(|| b.scroll_depth_percent.total_cmp(&a.scroll_depth_percent))
                .then_with(|| a.page_url.cmp(&b.page_url))
        });
        rows.truncate(filter.limit.max(0) as usize);
        rows
    }
}

impl Default for MemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PrimaryEventStore for MemoryEventStore {
    async fn ensure_schema(&self) -> anyhow::Result<()> {
        self.gate().await
    }

    async fn insert_event(&self, event: &TrackedEvent) -> anyhow::Result<()> {
        self.gate().await?;
        self.store(event);
        Ok(())
    }

    async fn find_event(&self, kind: EventKind, event_id: Uuid) -> anyhow::Result<Option<EventRecord>> {
        self.gate().await?;
        Ok(lock(&self.events)
            .iter()
            .find(|event| event.event_id == event_id && event.kind() == kind)
            .map(|event| EventRecord {
                event_id: event.event_id,
                kind: event.kind(),
                session_id: event.session_id.clone(),
                user_id: event.user_id.clone(),
                occurred_at: event.occurred_at,
            }))
    }

    async fn page_visit_stats(&self, filter: &PageVisitFilter) -> anyhow::Result<Vec<PageVisitStat>> {
        self.gate().await?;
        Ok(self.stats(filter))
    }

    async fn page_visit_totals(&self, window: &TimeWindow) -> anyhow::Result<PageVisitTotals> {
        self.gate().await?;
        let events = lock(&self.events);
        let visits: Vec<_> =
            Self::visits_matching(&events, |event| window.contains(event.occurred_at)).collect();
        let sessions: HashSet<_> = visits.iter().map(|(event, _)| &event.session_id).collect();
        let users: HashSet<_> = visits.iter().filter_map(|(event, _)| event.user_id.as_ref()).collect();
        let avg_duration = if visits.is_empty() {
            None
        } else {
            let total: i64 = visits.iter().map(|(_, visit)| i64::from(visit.duration_seconds)).sum();
            Some(total as f64 / visits.len() as f64)
        };
        Ok(PageVisitTotals {
            total_visits: visits.len() as u64,
            unique_sessions: sessions.len() as u64,
            unique_users: users.len() as u64,
            avg_duration,
        })
    }

    async fn event_totals(&self, window: &TimeWindow) -> anyhow::Result<EventTotals> {
        self.gate().await?;
        let events = lock(&self.events);
        let mut total_events = 0;
        let mut types = HashSet::new();
        for event in events.iter().filter(|event| window.contains(event.occurred_at)) {
            if let EventPayload::Custom(custom) = &event.payload {
                total_events += 1;
                types.insert(custom.event_type.clone());
            }
        }
        Ok(EventTotals {
            total_events,
            unique_event_types: types.len() as u64,
        })
    }

    async fn top_pages(&self, window: &TimeWindow, limit: i64) -> anyhow::Result<Vec<TopPage>> {
        self.gate().await?;
        let events = lock(&self.events);
        let mut counts: HashMap<String, u64> = HashMap::new();
        for (_, visit) in Self::visits_matching(&events, |event| window.contains(event.occurred_at)) {
            *counts.entry(visit.path.clone()).or_default() += 1;
        }
        let mut pages: Vec<TopPage> = counts
            .into_iter()
            .map(|(path, visits)| TopPage { path, visits })
            .collect();
        pages.sort_by(|a, b| b.visits.cmp(&a.visits).then_with(|| a.path.cmp(&b.path)));
        pages.truncate(limit.max(0) as usize);
        Ok(pages)
    }

    async fn device_breakdown(&self, window: &TimeWindow) -> anyhow::Result<Vec<DeviceCount>> {
        self.gate().await?;
        let events = lock(&self.events);
        let mut counts: HashMap<String, u64> = HashMap::new();
        for (event, _) in Self::visits_matching(&events, |event| window.contains(event.occurred_at)) {
            if let Some(device_type) = event.device_type() {
                *counts.entry(device_type.to_string()).or_default() += 1;
            }
        }
        let mut devices: Vec<DeviceCount> = counts
            .into_iter()
            .map(|(device_type, count)| DeviceCount { device_type, count })
            .collect();
        devices.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.device_type.cmp(&b.device_type)));
        Ok(devices)
    }

    async fn click_stats(&self, filter: &InteractionFilter) -> anyhow::Result<Vec<ClickStat>> {
        self.gate().await?;
        Ok(self.clicks(filter))
    }

    async fn scroll_stats(&self, filter: &InteractionFilter) -> anyhow::Result<Vec<ScrollStat>> {
        self.gate().await?;
        Ok(self.scrolls(filter))
    }

    async fn ping(&self) -> anyhow::Result<()> {
        self.gate().await
    }
}

#[async_trait]
impl SecondaryEventStore for MemoryEventStore {
    async fn ensure_schema(&self) -> anyhow::Result<()> {
        self.gate().await
    }

    async fn insert_event(&self, event: &TrackedEvent) -> anyhow::Result<()> {
        self.gate().await?;
        self.store(event);
        Ok(())
    }

    async fn page_visit_stats(&self, filter: &PageVisitFilter) -> anyhow::Result<Vec<PageVisitStat>> {
        self.gate().await?;
        Ok(self.stats(filter))
    }

    async fn click_stats(&self, filter: &InteractionFilter) -> anyhow::Result<Vec<ClickStat>> {
        self.gate().await?;
        Ok(self.clicks(filter))
    }

    async fn scroll_stats(&self, filter: &InteractionFilter) -> anyhow::Result<Vec<ScrollStat>> {
        self.gate().await?;
        Ok(self.scrolls(filter))
    }

    async fn ping(&self) -> anyhow::Result<()> {
        self.gate().await
    }
}

#[derive(Default)]
struct OrderTables {
    orders: Mutex<Vec<Order>>,
    rollbacks: AtomicUsize,
    commits: AtomicUsize,
    /// Number of upcoming header inserts that report a duplicate order number.
    collisions: AtomicUsize,
    /// Fail the item insert at this zero-based position in every transaction.
    fail_item_at: Mutex<Option<usize>>,
    /// Keep lines newest-first, the way an unordered table scan may return them.
    scramble_items: AtomicBool,
}

/// Order store whose transactions only become visible on commit.
#[derive(Default)]
pub struct MemoryOrderStore {
    tables: Arc<OrderTables>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_item_at(&self, position: usize) {
        *lock(&self.tables.fail_item_at) = Some(position);
    }

    pub fn scramble_item_storage(&self) {
        self.tables.scramble_items.store(true, Ordering::SeqCst);
    }

    pub fn collide_next(&self, times: usize) {
        self.tables.collisions.store(times, Ordering::SeqCst);
    }

    pub fn orders(&self) -> Vec<Order> {
        lock(&self.tables.orders).clone()
    }

    pub fn item_count(&self) -> usize {
        lock(&self.tables.orders).iter().map(|order| order.items.len()).sum()
    }

    pub fn rollbacks(&self) -> usize {
        self.tables.rollbacks.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> usize {
        self.tables.commits.load(Ordering::SeqCst)
    }

    /// Inserts an already-committed order, for read and update tests.
    pub fn seed(&self, user_id: &str, status: OrderStatus) -> Order {
        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            order_number: storefront_domain::next_order_number(),
            total_amount: rust_decimal::Decimal::new(5999, 2),
            currency: "USD".to_string(),
            status,
            payment_status: PaymentStatus::Pending,
            payment_method: Some("credit_card".to_string()),
            shipping_address: serde_json::json!({"city": "Colombo"}),
            billing_address: None,
            items: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        lock(&self.tables.orders).push(order.clone());
        order
    }
}

fn lines_in_position_order(mut order: Order) -> Order {
    order.items.sort_by_key(|item| item.position);
    order
}

struct MemoryOrderTransaction {
    tables: Arc<OrderTables>,
    pending: Option<Order>,
    items_written: usize,
}

#[async_trait]
impl OrderTransaction for MemoryOrderTransaction {
    async fn insert_order(&mut self, order: &NewOrder, order_number: &str) -> anyhow::Result<Order> {
        let collided = self
            .tables
            .collisions
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        let duplicate = lock(&self.tables.orders)
            .iter()
            .any(|existing| existing.order_number == order_number);
        if collided || duplicate {
            return Err(anyhow::Error::new(OrderNumberTaken(order_number.to_string())));
        }
        let now = Utc::now();
        let created = Order {
            id: Uuid::new_v4(),
            user_id: order.user_id.clone(),
            order_number: order_number.to_string(),
            total_amount: order.total_amount,
            currency: order.currency.clone(),
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_method: Some(order.payment_method.clone()),
            shipping_address: order.shipping_address.clone(),
            billing_address: Some(order.billing_address.clone()),
            items: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.pending = Some(created.clone());
        Ok(created)
    }

    async fn insert_item(
        &mut self,
        order_id: Uuid,
        position: i32,
        item: &NewOrderItem,
    ) -> anyhow::Result<OrderItem> {
        if *lock(&self.tables.fail_item_at) == Some(self.items_written) {
            return Err(anyhow!("insert into order_items failed"));
        }
        let pending = self
            .pending
            .as_mut()
            .filter(|pending| pending.id == order_id)
            .ok_or_else(|| anyhow!("order {} not written in this transaction", order_id))?;
        let row = OrderItem {
            id: Uuid::new_v4(),
            position,
            game_id: item.game_id.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price,
            total_price: item.total_price,
        };
        if self.tables.scramble_items.load(Ordering::SeqCst) {
            pending.items.insert(0, row.clone());
        } else {
            pending.items.push(row.clone());
        }
        self.items_written += 1;
        Ok(row)
    }

    async fn commit(self: Box<Self>) -> anyhow::Result<()> {
        let this = *self;
        if let Some(order) = this.pending {
            lock(&this.tables.orders).push(order);
        }
        this.tables.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> anyhow::Result<()> {
        self.tables.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn ensure_schema(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn begin(&self) -> anyhow::Result<Box<dyn OrderTransaction>> {
        Ok(Box::new(MemoryOrderTransaction {
            tables: self.tables.clone(),
            pending: None,
            items_written: 0,
        }))
    }

    async fn find_order(&self, id: Uuid) -> anyhow::Result<Option<Order>> {
        Ok(lock(&self.tables.orders)
            .iter()
            .find(|order| order.id == id)
            .cloned()
            .map(lines_in_position_order))
    }

    async fn list_user_orders(&self, user_id: &str) -> anyhow::Result<Vec<Order>> {
        let mut orders: Vec<Order> = lock(&self.tables.orders)
            .iter()
            .filter(|order| order.user_id == user_id)
            .cloned()
            .map(lines_in_position_order)
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn list_orders(
        &self,
        status: Option<OrderStatus>,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<(Vec<OrderSummary>, i64)> {
        let mut matching: Vec<Order> = lock(&self.tables.orders)
            .iter()
            .filter(|order| status.map(|status| order.status == status).unwrap_or(true))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .map(|order| OrderSummary {
                id: order.id,
                user_id: order.user_id,
                order_number: order.order_number,
                total_amount: order.total_amount,
                currency: order.currency,
                status: order.status,
                payment_status: order.payment_status,
                item_count: order.items.len() as i64,
                created_at: order.created_at,
            })
            .collect();
        Ok((page, total))
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: OrderStatus,
        from: &[OrderStatus],
    ) -> anyhow::Result<Option<StatusChange>> {
        let mut orders = lock(&self.tables.orders);
        let Some(order) = orders
            .iter_mut()
            .find(|order| order.id == id && (from.is_empty() || from.contains(&order.status)))
        else {
            return Ok(None);
        };
        order.status = status;
        order.updated_at = Utc::now();
        Ok(Some(StatusChange {
            id: order.id,
            order_number: order.order_number.clone(),
            status: order.status,
            updated_at: order.updated_at,
        }))
    }

    async fn ping(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

pub struct StaticHealth {
    pub primary: bool,
    pub secondary: StoreStatus,
}

#[async_trait]
impl HealthCheckService for StaticHealth {
    async fn check_primary(&self) -> anyhow::Result<bool> {
        if self.primary {
            Ok(true)
        } else {
            Err(anyhow!("connection refused"))
        }
    }

    async fn check_secondary(&self) -> anyhow::Result<StoreStatus> {
        Ok(self.secondary)
    }
}

/// Stores behind an `AppState`, kept so tests can inspect them afterwards.
pub struct TestStores {
    pub primary: Arc<MemoryEventStore>,
    pub secondary: Option<Arc<MemoryEventStore>>,
    pub orders: Arc<MemoryOrderStore>,
}

impl TestStores {
    pub fn new(secondary: Option<StoreMode>) -> Self {
        Self {
            primary: Arc::new(MemoryEventStore::new()),
            secondary: secondary.map(|mode| Arc::new(MemoryEventStore::with_mode(mode))),
            orders: Arc::new(MemoryOrderStore::new()),
        }
    }

    pub fn with_primary(mut self, mode: StoreMode) -> Self {
        self.primary = Arc::new(MemoryEventStore::with_mode(mode));
        self
    }

    pub fn state(&self) -> AppState {
        let config = RuntimeConfig {
            secondary_timeout_ms: 50,
            ..RuntimeConfig::default()
        };
        let secondary_status = if self.secondary.is_some() {
            StoreStatus::Connected
        } else {
            StoreStatus::Disabled
        };
        AppState {
            config,
            primary_events: self.primary.clone(),
            secondary_events: self
                .secondary
                .clone()
                .map(|store| store as Arc<dyn SecondaryEventStore>),
            orders: self.orders.clone(),
            health: Arc::new(StaticHealth {
                primary: true,
                secondary: secondary_status,
            }),
            metrics: Arc::new(Metrics::default()),
        }
    }
}
