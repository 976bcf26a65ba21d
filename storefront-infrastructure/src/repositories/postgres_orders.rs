use std::collections::HashMap;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use storefront_domain::ports::{OrderStore, OrderTransaction};
use storefront_domain::{
    NewOrder, NewOrderItem, Order, OrderItem, OrderNumberTaken, OrderStatus, OrderSummary,
    PaymentStatus, StatusChange,
};

const SCHEMA: [&str; 6] = [
    r#"
CREATE TABLE IF NOT EXISTS orders (
    id UUID PRIMARY KEY,
    user_id VARCHAR(255) NOT NULL,
    order_number VARCHAR(50) NOT NULL UNIQUE,
    total_amount NUMERIC(10, 2) NOT NULL,
    currency VARCHAR(3) NOT NULL DEFAULT 'USD',
    status VARCHAR(20) NOT NULL DEFAULT 'pending',
    payment_method VARCHAR(50),
    payment_status VARCHAR(20) NOT NULL DEFAULT 'pending',
    shipping_address JSONB NOT NULL,
    billing_address JSONB,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#,
    r#"
CREATE TABLE IF NOT EXISTS order_items (
    id UUID PRIMARY KEY,
    order_id UUID NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
    position INTEGER NOT NULL DEFAULT 0,
    game_id VARCHAR(255) NOT NULL,
    quantity INTEGER NOT NULL CHECK (quantity > 0),
    unit_price NUMERIC(10, 2) NOT NULL,
    total_price NUMERIC(10, 2) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#,
    // tables created before line positions were recorded
    "ALTER TABLE order_items ADD COLUMN IF NOT EXISTS position INTEGER NOT NULL DEFAULT 0",
    "CREATE INDEX IF NOT EXISTS idx_orders_user ON orders (user_id, created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_orders_status ON orders (status, created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_order_items_order ON order_items (order_id, position)",
];

const ITEMS_FOR_ORDERS: &str = r#"
    SELECT id, order_id, position, game_id, quantity, unit_price, total_price
    FROM order_items
    WHERE order_id = ANY($1)
    ORDER BY order_id, position
"#;

const ORDER_COLUMNS: &str = "id, user_id, order_number, total_amount, currency, status, \
    payment_method, payment_status, shipping_address, billing_address, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    user_id: String,
    order_number: String,
    total_amount: Decimal,
    currency: String,
    status: String,
    payment_method: Option<String>,
    payment_status: String,
    shipping_address: serde_json::Value,
    billing_address: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Result<Order> {
        Ok(Order {
            id: self.id,
            user_id: self.user_id,
            order_number: self.order_number,
            total_amount: self.total_amount,
            currency: self.currency,
            status: self.status.parse::<OrderStatus>()?,
            payment_status: self.payment_status.parse::<PaymentStatus>()?,
            payment_method: self.payment_method,
            shipping_address: self.shipping_address,
            billing_address: self.billing_address,
            items,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: Uuid,
    order_id: Uuid,
    position: i32,
    game_id: String,
    quantity: i32,
    unit_price: Decimal,
    total_price: Decimal,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        OrderItem {
            id: row.id,
            position: row.position,
            game_id: row.game_id,
            quantity: row.quantity,
            unit_price: row.unit_price,
            total_price: row.total_price,
        }
    }
}

#[derive(sqlx::FromRow)]
struct OrderSummaryRow {
    id: Uuid,
    user_id: String,
    order_number: String,
    total_amount: Decimal,
    currency: String,
    status: String,
    payment_status: String,
    item_count: i64,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrderSummaryRow> for OrderSummary {
    type Error = anyhow::Error;

    fn try_from(row: OrderSummaryRow) -> Result<Self> {
        Ok(OrderSummary {
            id: row.id,
            user_id: row.user_id,
            order_number: row.order_number,
            total_amount: row.total_amount,
            currency: row.currency,
            status: row.status.parse::<OrderStatus>()?,
            payment_status: row.payment_status.parse::<PaymentStatus>()?,
            item_count: row.item_count,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct StatusChangeRow {
    id: Uuid,
    order_number: String,
    status: String,
    updated_at: DateTime<Utc>,
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[derive(Clone)]
pub struct PostgresOrderRepo {
    pool: PgPool,
}

impl PostgresOrderRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn items_for(&self, order_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<OrderItem>>> {
        let rows: Vec<OrderItemRow> = sqlx::query_as(ITEMS_FOR_ORDERS)
            .bind(order_ids)
            .fetch_all(&self.pool)
            .await?;

        let mut grouped: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        for row in rows {
            grouped.entry(row.order_id).or_default().push(row.into());
        }
        Ok(grouped)
    }
}

/// One order header and its items, written inside a single database transaction.
pub struct PostgresOrderTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl OrderTransaction for PostgresOrderTransaction {
    async fn insert_order(&mut self, order: &NewOrder, order_number: &str) -> Result<Order> {
        let sql = format!(
            r#"
            INSERT INTO orders (
                id, user_id, order_number, total_amount, currency, status,
                payment_method, payment_status, shipping_address, billing_address
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            ORDER_COLUMNS
        );
        let inserted = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(&order.user_id)
            .bind(order_number)
            .bind(order.total_amount)
            .bind(&order.currency)
            .bind(OrderStatus::Pending.as_str())
            .bind(&order.payment_method)
            .bind(PaymentStatus::Pending.as_str())
            .bind(&order.shipping_address)
            .bind(&order.billing_address)
            .fetch_one(&mut *self.tx)
            .await;

        match inserted {
            Ok(row) => row.into_order(Vec::new()),
            Err(err) if is_unique_violation(&err) => {
                Err(anyhow::Error::new(OrderNumberTaken(order_number.to_string())))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn insert_item(
        &mut self,
        order_id: Uuid,
        position: i32,
        item: &NewOrderItem,
    ) -> Result<OrderItem> {
        let row: OrderItemRow = sqlx::query_as(
            r#"
            INSERT INTO order_items (
                id, order_id, position, game_id, quantity, unit_price, total_price
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, order_id, position, game_id, quantity, unit_price, total_price
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(order_id)
        .bind(position)
        .bind(&item.game_id)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(item.total_price)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(row.into())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl OrderStore for PostgresOrderRepo {
    async fn ensure_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn begin(&self) -> Result<Box<dyn OrderTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresOrderTransaction { tx }))
    }

    async fn find_order(&self, id: Uuid) -> Result<Option<Order>> {
        let sql = format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS);
        let Some(row) = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };
        let mut items = self.items_for(&[id]).await?;
        let order = row.into_order(items.remove(&id).unwrap_or_default())?;
        Ok(Some(order))
    }

    async fn list_user_orders(&self, user_id: &str) -> Result<Vec<Order>> {
        let sql = format!(
            "SELECT {} FROM orders WHERE user_id = $1 ORDER BY created_at DESC",
            ORDER_COLUMNS
        );
        let rows: Vec<OrderRow> = sqlx::query_as(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
        let mut items = self.items_for(&ids).await?;
        rows.into_iter()
            .map(|row| {
                let order_items = items.remove(&row.id).unwrap_or_default();
                row.into_order(order_items)
            })
            .collect()
    }

    async fn list_orders(
        &self,
        status: Option<OrderStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<OrderSummary>, i64)> {
        let status = status.map(|status| status.as_str());
        let rows: Vec<OrderSummaryRow> = sqlx::query_as(
            r#"
            SELECT
                o.id, o.user_id, o.order_number, o.total_amount, o.currency,
                o.status, o.payment_status, COUNT(oi.id) AS item_count, o.created_at
            FROM orders o
            LEFT JOIN order_items oi ON oi.order_id = o.id
            WHERE ($1::text IS NULL OR o.status = $1)
            GROUP BY o.id
            ORDER BY o.created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM orders WHERE ($1::text IS NULL OR status = $1)",
        )
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        let summaries = rows
            .into_iter()
            .map(OrderSummary::try_from)
            .collect::<Result<Vec<_>>>()?;
        Ok((summaries, total))
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: OrderStatus,
        from: &[OrderStatus],
    ) -> Result<Option<StatusChange>> {
        let from: Vec<String> = from.iter().map(|status| status.as_str().to_string()).collect();
        let row: Option<StatusChangeRow> = sqlx::query_as(
            r#"
            UPDATE orders
            SET status = $2, updated_at = NOW()
            WHERE id = $1 AND (cardinality($3::text[]) = 0 OR status = ANY($3))
            RETURNING id, order_number, status, updated_at
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(&from)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            let status = row
                .status
                .parse::<OrderStatus>()
                .map_err(|err| anyhow!("order {} has {}", row.id, err))?;
            Ok(StatusChange {
                id: row.id,
                order_number: row.order_number,
                status,
                updated_at: row.updated_at,
            })
        })
        .transpose()
    }

    async fn ping(&self) -> Result<()> {
        let _: i32 = sqlx::query_scalar("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: &str) -> OrderRow {
        OrderRow {
            id: Uuid::new_v4(),
            user_id: "42".to_string(),
            order_number: "ORD-1700000000000-ABCDEFGH".to_string(),
            total_amount: Decimal::new(5997, 2),
            currency: "USD".to_string(),
            status: status.to_string(),
            payment_method: Some("credit_card".to_string()),
            payment_status: "pending".to_string(),
            shipping_address: serde_json::json!({"city": "Lisbon"}),
            billing_address: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn stored_status_is_parsed() {
        let order = row("shipped").into_order(Vec::new()).expect("order");
        assert_eq!(order.status, OrderStatus::Shipped);
        assert_eq!(order.payment_status, PaymentStatus::Pending);
    }

    #[test]
    fn unknown_stored_status_is_an_error() {
        assert!(row("returned").into_order(Vec::new()).is_err());
    }

    #[test]
    fn order_number_is_unique_in_schema() {
        assert!(SCHEMA[0].contains("order_number VARCHAR(50) NOT NULL UNIQUE"));
        assert!(SCHEMA[1].contains("ON DELETE CASCADE"));
    }

    #[test]
    fn lines_are_read_back_by_position() {
        assert!(SCHEMA[1].contains("position INTEGER NOT NULL"));
        assert!(ITEMS_FOR_ORDERS.contains("ORDER BY order_id, position"));
        assert!(!ITEMS_FOR_ORDERS.contains("created_at"));
    }
}
