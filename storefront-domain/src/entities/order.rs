// Order entity
// An order header plus the line items created with it in one transaction

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::utils::opt_string_or_number;
use crate::value_objects::{OrderStatus, PaymentStatus};

pub const DEFAULT_CURRENCY: &str = "USD";
pub const DEFAULT_PAYMENT_METHOD: &str = "credit_card";
/// Largest amount a `NUMERIC(10, 2)` money column holds.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(1_410_065_407, 2, 0, false, 2);

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub user_id: Option<String>,
    pub items: Option<Vec<OrderItemRequest>>,
    pub total_amount: Option<Decimal>,
    pub currency: Option<String>,
    pub payment_method: Option<String>,
    pub shipping_address: Option<serde_json::Value>,
    pub billing_address: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRequest {
    #[serde(default, alias = "id", deserialize_with = "opt_string_or_number")]
    pub game_id: Option<String>,
    pub quantity: Option<i32>,
    #[serde(alias = "price")]
    pub unit_price: Option<Decimal>,
    pub total_price: Option<Decimal>,
}

/// A validated order, ready to be written.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: String,
    pub items: Vec<NewOrderItem>,
    pub total_amount: Decimal,
    pub currency: String,
    pub payment_method: String,
    pub shipping_address: serde_json::Value,
    pub billing_address: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewOrderItem {
    pub game_id: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
}

impl NewOrderItem {
    /// `None` when the derived line total overflows.
    pub fn new(
        game_id: String,
        quantity: i32,
        unit_price: Decimal,
        total_price: Option<Decimal>,
    ) -> Option<Self> {
        let total_price = match total_price {
            Some(total) => total,
            None => unit_price.checked_mul(Decimal::from(quantity))?,
        };
        Some(Self {
            game_id,
            quantity,
            unit_price,
            total_price,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub user_id: String,
    pub order_number: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    pub currency: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: Option<String>,
    pub shipping_address: serde_json::Value,
    pub billing_address: Option<serde_json::Value>,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: Uuid,
    /// Zero-based place of the line in the order as submitted.
    pub position: i32,
    pub game_id: String,
    pub quantity: i32,
    #[serde(with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_price: Decimal,
}

/// Row of the admin order listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub id: Uuid,
    pub user_id: String,
    pub order_number: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    pub currency: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub item_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pagination {
    pub current_page: u32,
    pub per_page: u32,
    pub total: i64,
    pub total_pages: i64,
}

impl Pagination {
    pub fn new(current_page: u32, per_page: u32, total: i64) -> Self {
        let per_page_wide = i64::from(per_page.max(1));
        Self {
            current_page,
            per_page,
            total,
            total_pages: (total + per_page_wide - 1) / per_page_wide,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrderPage {
    pub orders: Vec<OrderSummary>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub id: Uuid,
    pub order_number: String,
    pub status: OrderStatus,
    pub updated_at: DateTime<Utc>,
}

/// Raised by an order store when the generated order number is already taken.
#[derive(Debug, Clone, Error)]
#[error("order number '{0}' already exists")]
pub struct OrderNumberTaken(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_total_defaults_to_quantity_times_unit_price() {
        let item = NewOrderItem::new("game-1".to_string(), 3, Decimal::new(1999, 2), None)
            .expect("line");
        assert_eq!(item.total_price, Decimal::new(5997, 2));
    }

    #[test]
    fn caller_supplied_line_total_wins() {
        let item = NewOrderItem::new(
            "game-1".to_string(),
            3,
            Decimal::new(1999, 2),
            Some(Decimal::new(5000, 2)),
        )
        .expect("line");
        assert_eq!(item.total_price, Decimal::new(5000, 2));
    }

    #[test]
    fn overflowing_line_total_is_refused() {
        assert!(NewOrderItem::new("game-1".to_string(), i32::MAX, Decimal::MAX, None).is_none());
    }

    #[test]
    fn max_amount_matches_numeric_10_2() {
        assert_eq!(MAX_AMOUNT, Decimal::new(9_999_999_999, 2));
    }

    #[test]
    fn total_pages_round_up() {
        assert_eq!(Pagination::new(1, 10, 0).total_pages, 0);
        assert_eq!(Pagination::new(1, 10, 10).total_pages, 1);
        assert_eq!(Pagination::new(3, 10, 21).total_pages, 3);
    }

    #[test]
    fn item_request_accepts_legacy_aliases() {
        let item: OrderItemRequest =
            serde_json::from_str(r#"{"id": 7, "quantity": 2, "price": 10.5}"#).expect("item");
        assert_eq!(item.game_id.as_deref(), Some("7"));
        assert_eq!(item.unit_price, Some(Decimal::new(105, 1)));
    }
}
