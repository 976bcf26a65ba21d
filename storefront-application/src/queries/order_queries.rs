use tracing::error;

use crate::commands::order_commands::{order_not_found, parse_order_id};
use crate::AppError;
use crate::AppState;
use storefront_domain::{Order, OrderListQuery, OrderPage, OrderStatus, Pagination};

pub const DEFAULT_ORDERS_PER_PAGE: u32 = 10;
pub const MAX_ORDERS_PER_PAGE: u32 = 100;

pub async fn get_order(state: &AppState, id: &str) -> Result<Order, AppError> {
    let order_id = parse_order_id(id)?;
    state
        .orders
        .find_order(order_id)
        .await
        .map_err(|err| {
            error!("failed to fetch order {}: {:#}", id, err);
            AppError::primary("Failed to fetch order", err)
        })?
        .ok_or_else(|| order_not_found(id))
}

/// Newest first, each order with its lines.
pub async fn list_user_orders(state: &AppState, user_id: &str) -> Result<Vec<Order>, AppError> {
    state.orders.list_user_orders(user_id.trim()).await.map_err(|err| {
        error!("failed to fetch orders for user {}: {:#}", user_id, err);
        AppError::primary("Failed to fetch orders", err)
    })
}

pub async fn list_orders(state: &AppState, query: OrderListQuery) -> Result<OrderPage, AppError> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query
        .limit
        .unwrap_or(DEFAULT_ORDERS_PER_PAGE)
        .clamp(1, MAX_ORDERS_PER_PAGE);
    let status = query
        .status
        .filter(|status| !status.trim().is_empty())
        .map(|status| status.parse::<OrderStatus>())
        .transpose()
        .map_err(|err| AppError::BadRequest(err.to_string()))?;
    let offset = i64::from(page - 1) * i64::from(per_page);

    let (orders, total) = state
        .orders
        .list_orders(status, i64::from(per_page), offset)
        .await
        .map_err(|err| {
            error!("failed to list orders: {:#}", err);
            AppError::primary("Failed to fetch orders", err)
        })?;
    Ok(OrderPage {
        orders,
        pagination: Pagination::new(page, per_page, total),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::order_commands::create_order;
    use crate::testing::TestStores;
    use storefront_domain::CreateOrderRequest;

    #[tokio::test]
    async fn unknown_order_is_not_found() {
        let stores = TestStores::new(None);
        let state = stores.state();

        let err = get_order(&state, &uuid::Uuid::new_v4().to_string())
            .await
            .expect_err("missing");
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn lines_come_back_in_submitted_order() {
        let stores = TestStores::new(None);
        stores.orders.scramble_item_storage();
        let state = stores.state();
        let request: CreateOrderRequest = serde_json::from_value(serde_json::json!({
            "userId": "u1",
            "items": [
                {"gameId": "g-1", "unitPrice": 10},
                {"gameId": "g-2", "unitPrice": 20},
                {"gameId": "g-3", "unitPrice": 30}
            ],
            "totalAmount": 60,
            "shippingAddress": {"city": "Galle"}
        }))
        .expect("order body");
        let created = create_order(&state, request).await.expect("created");

        let expected = vec!["g-1", "g-2", "g-3"];
        let order = get_order(&state, &created.id.to_string()).await.expect("order");
        let games: Vec<&str> = order.items.iter().map(|item| item.game_id.as_str()).collect();
        assert_eq!(games, expected);

        let orders = list_user_orders(&state, "u1").await.expect("orders");
        let games: Vec<&str> = orders[0].items.iter().map(|item| item.game_id.as_str()).collect();
        assert_eq!(games, expected);
    }

    #[tokio::test]
    async fn user_orders_are_scoped_to_the_user() {
        let stores = TestStores::new(None);
        let state = stores.state();
        stores.orders.seed("u1", OrderStatus::Pending);
        stores.orders.seed("u1", OrderStatus::Shipped);
        stores.orders.seed("u2", OrderStatus::Pending);

        let orders = list_user_orders(&state, "u1").await.expect("orders");
        assert_eq!(orders.len(), 2);
        assert!(orders.iter().all(|order| order.user_id == "u1"));
    }

    #[tokio::test]
    async fn admin_listing_paginates_and_filters() {
        let stores = TestStores::new(None);
        let state = stores.state();
        for _ in 0..3 {
            stores.orders.seed("u1", OrderStatus::Pending);
        }
        stores.orders.seed("u2", OrderStatus::Delivered);

        let page = list_orders(
            &state,
            OrderListQuery {
                page: Some(2),
                limit: Some(2),
                status: None,
            },
        )
        .await
        .expect("page");
        assert_eq!(page.orders.len(), 2);
        assert_eq!(page.pagination.total, 4);
        assert_eq!(page.pagination.total_pages, 2);

        let pending = list_orders(
            &state,
            OrderListQuery {
                status: Some("pending".to_string()),
                ..Default::default()
            },
        )
        .await
        .expect("filtered");
        assert_eq!(pending.pagination.total, 3);

        let err = list_orders(
            &state,
            OrderListQuery {
                status: Some("lost".to_string()),
                ..Default::default()
            },
        )
        .await
        .expect_err("bad status");
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
