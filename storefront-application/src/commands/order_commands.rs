use rust_decimal::Decimal;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::AppError;
use crate::AppState;
use storefront_domain::ports::{OrderStore, OrderTransaction};
use storefront_domain::{
    next_order_number, CreateOrderRequest, NewOrder, NewOrderItem, Order, OrderNumberTaken,
    OrderStatus, StatusChange, StatusUpdateRequest, DEFAULT_CURRENCY, DEFAULT_PAYMENT_METHOD,
    MAX_AMOUNT,
};

const ORDER_REQUIRED_FIELDS: [&str; 4] = ["userId", "items", "totalAmount", "shippingAddress"];
const MAX_ORDER_NUMBER_ATTEMPTS: usize = 3;

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}

fn check_amount(field: &str, amount: Decimal) -> Result<(), AppError> {
    if amount < Decimal::ZERO {
        return Err(AppError::BadRequest(format!("{} must not be negative", field)));
    }
    if amount > MAX_AMOUNT {
        return Err(AppError::BadRequest(format!(
            "{} must not exceed {}",
            field, MAX_AMOUNT
        )));
    }
    Ok(())
}

/// Checks an order request and fills in defaults. Runs before any I/O.
pub fn validate_order(request: CreateOrderRequest) -> Result<NewOrder, AppError> {
    let user_id = non_blank(request.user_id);
    let items = request.items.filter(|items| !items.is_empty());
    let shipping_address = request.shipping_address.filter(|address| !address.is_null());

    let present = [
        user_id.is_some(),
        items.is_some(),
        request.total_amount.is_some(),
        shipping_address.is_some(),
    ];
    let (Some(user_id), Some(items), Some(total_amount), Some(shipping_address)) =
        (user_id, items, request.total_amount, shipping_address)
    else {
        let missing = ORDER_REQUIRED_FIELDS
            .iter()
            .zip(present)
            .filter(|(_, present)| !present)
            .map(|(name, _)| *name)
            .collect();
        return Err(AppError::Validation {
            missing,
            required: ORDER_REQUIRED_FIELDS.to_vec(),
        });
    };

    check_amount("totalAmount", total_amount)?;

    let mut lines = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let Some(game_id) = non_blank(item.game_id) else {
            return Err(AppError::BadRequest(format!("items[{}]: gameId is required", index)));
        };
        let Some(unit_price) = item.unit_price else {
            return Err(AppError::BadRequest(format!("items[{}]: unitPrice is required", index)));
        };
        let quantity = item.quantity.unwrap_or(1);
        if quantity < 1 {
            return Err(AppError::BadRequest(format!(
                "items[{}]: quantity must be at least 1",
                index
            )));
        }
        check_amount(&format!("items[{}].unitPrice", index), unit_price)?;
        if let Some(total_price) = item.total_price {
            check_amount(&format!("items[{}].totalPrice", index), total_price)?;
        }
        let line = NewOrderItem::new(game_id, quantity, unit_price, item.total_price)
            .ok_or_else(|| AppError::BadRequest(format!("items[{}]: line total overflows", index)))?;
        check_amount(&format!("items[{}].totalPrice", index), line.total_price)?;
        lines.push(line);
    }

    let billing_address = request
        .billing_address
        .filter(|address| !address.is_null())
        .unwrap_or_else(|| shipping_address.clone());

    Ok(NewOrder {
        user_id,
        items: lines,
        total_amount,
        currency: non_blank(request.currency).unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        payment_method: non_blank(request.payment_method)
            .unwrap_or_else(|| DEFAULT_PAYMENT_METHOD.to_string()),
        shipping_address,
        billing_address,
    })
}

pub async fn create_order(state: &AppState, request: CreateOrderRequest) -> Result<Order, AppError> {
    let order = validate_order(request)?;

    let mut attempt = 0;
    loop {
        attempt += 1;
        let order_number = next_order_number();
        match write_order(state.orders.as_ref(), &order, &order_number).await {
            Ok(created) => {
                state.metrics.record_order_created();
                info!(
                    "created order {} for user {} with {} items",
                    created.order_number,
                    created.user_id,
                    created.items.len()
                );
                return Ok(created);
            }
            Err(err)
                if attempt < MAX_ORDER_NUMBER_ATTEMPTS
                    && err.downcast_ref::<OrderNumberTaken>().is_some() =>
            {
                warn!("order number {} already taken, retrying", order_number);
            }
            Err(err) => {
                state.metrics.record_order_failure();
                error!("failed to create order for user {}: {:#}", order.user_id, err);
                return Err(AppError::primary("Failed to create order", err));
            }
        }
    }
}

/// Header and lines in one transaction. Any failure rolls the whole order back.
async fn write_order(
    store: &dyn OrderStore,
    order: &NewOrder,
    order_number: &str,
) -> anyhow::Result<Order> {
    let mut tx = store.begin().await?;
    match insert_order_rows(tx.as_mut(), order, order_number).await {
        Ok(created) => {
            tx.commit().await?;
            Ok(created)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!("rollback of order {} failed: {:#}", order_number, rollback_err);
            }
            Err(err)
        }
    }
}

async fn insert_order_rows(
    tx: &mut dyn OrderTransaction,
    order: &NewOrder,
    order_number: &str,
) -> anyhow::Result<Order> {
    let mut created = tx.insert_order(order, order_number).await?;
    for (position, item) in (0_i32..).zip(&order.items) {
        let row = tx.insert_item(created.id, position, item).await?;
        created.items.push(row);
    }
    Ok(created)
}

pub(crate) fn parse_order_id(id: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(id.trim()).map_err(|_| order_not_found(id))
}

pub(crate) fn order_not_found(id: &str) -> AppError {
    AppError::NotFound(format!("Order with ID {} not found", id))
}

fn invalid_status() -> AppError {
    AppError::BadRequest(format!(
        "Invalid status. Valid statuses: {}",
        OrderStatus::valid_values()
    ))
}

pub async fn update_order_status(
    state: &AppState,
    id: &str,
    request: StatusUpdateRequest,
) -> Result<StatusChange, AppError> {
    let next: OrderStatus = non_blank(request.status)
        .ok_or_else(invalid_status)?
        .parse()
        .map_err(|_| invalid_status())?;
    change_status(state, id, next).await
}

/// Soft delete: the order stays, its status becomes `cancelled`.
pub async fn cancel_order(state: &AppState, id: &str) -> Result<StatusChange, AppError> {
    change_status(state, id, OrderStatus::Cancelled).await
}

async fn change_status(
    state: &AppState,
    id: &str,
    next: OrderStatus,
) -> Result<StatusChange, AppError> {
    let order_id = parse_order_id(id)?;
    let store_error = |err: anyhow::Error| {
        error!("failed to update status of order {}: {:#}", id, err);
        AppError::primary("Failed to update order status", err)
    };

    if !state.config.enforce_status_transitions {
        return state
            .orders
            .update_status(order_id, next, &[])
            .await
            .map_err(store_error)?
            .ok_or_else(|| order_not_found(id));
    }

    let current = state
        .orders
        .find_order(order_id)
        .await
        .map_err(store_error)?
        .ok_or_else(|| order_not_found(id))?;
    if !current.status.can_transition_to(next) {
        return Err(AppError::Conflict(format!(
            "Cannot change order status from {} to {}",
            current.status, next
        )));
    }

    // re-checked inside the UPDATE
    let allowed: Vec<OrderStatus> = OrderStatus::ALL
        .into_iter()
        .filter(|status| status.can_transition_to(next))
        .collect();
    state
        .orders
        .update_status(order_id, next, &allowed)
        .await
        .map_err(store_error)?
        .ok_or_else(|| {
            AppError::Conflict(format!("Order {} changed status concurrently", current.order_number))
        })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::testing::TestStores;
    use storefront_domain::is_order_number;

    fn request(body: serde_json::Value) -> CreateOrderRequest {
        serde_json::from_value(body).expect("order body")
    }

    fn two_item_order() -> CreateOrderRequest {
        request(json!({
            "userId": 7,
            "items": [
                {"gameId": "g-1", "quantity": 2, "unitPrice": 19.99},
                {"id": "g-2", "price": 5}
            ],
            "totalAmount": 44.98,
            "shippingAddress": {"street": "1 Main St", "city": "Colombo"}
        }))
    }

    #[test]
    fn missing_order_fields_are_listed() {
        let err = validate_order(request(json!({"userId": "u1", "items": []}))).expect_err("invalid");
        match err {
            AppError::Validation { missing, required } => {
                assert_eq!(missing, vec!["items", "totalAmount", "shippingAddress"]);
                assert_eq!(required, ORDER_REQUIRED_FIELDS.to_vec());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn defaults_are_filled_in() {
        let order = validate_order(two_item_order()).expect("valid");
        assert_eq!(order.user_id, "7");
        assert_eq!(order.currency, "USD");
        assert_eq!(order.payment_method, "credit_card");
        assert_eq!(order.billing_address, order.shipping_address);
        assert_eq!(order.items[0].total_price, Decimal::new(3998, 2));
        assert_eq!(order.items[1].quantity, 1);
        assert_eq!(order.items[1].total_price, Decimal::new(5, 0));
    }

    #[test]
    fn items_need_a_product_and_price() {
        let no_price = request(json!({
            "userId": "u1",
            "items": [{"gameId": "g-1", "quantity": 1}],
            "totalAmount": 10,
            "shippingAddress": {"city": "Kandy"}
        }));
        assert!(matches!(validate_order(no_price), Err(AppError::BadRequest(_))));

        let zero_quantity = request(json!({
            "userId": "u1",
            "items": [{"gameId": "g-1", "quantity": 0, "unitPrice": 3}],
            "totalAmount": 10,
            "shippingAddress": {"city": "Kandy"}
        }));
        assert!(matches!(validate_order(zero_quantity), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn oversized_prices_are_rejected() {
        let huge_unit_price = request(json!({
            "userId": "u1",
            "items": [{"gameId": "g-1", "quantity": 2, "unitPrice": 7.0e28}],
            "totalAmount": 10,
            "shippingAddress": {"city": "Kandy"}
        }));
        assert!(matches!(validate_order(huge_unit_price), Err(AppError::BadRequest(_))));

        let line_over_column_range = request(json!({
            "userId": "u1",
            "items": [{"gameId": "g-1", "quantity": 2, "unitPrice": 90000000}],
            "totalAmount": 10,
            "shippingAddress": {"city": "Kandy"}
        }));
        match validate_order(line_over_column_range) {
            Err(AppError::BadRequest(message)) => assert!(message.contains("items[0].totalPrice")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn negative_line_prices_are_rejected() {
        let negative_unit = request(json!({
            "userId": "u1",
            "items": [{"gameId": "g-1", "unitPrice": -1}],
            "totalAmount": 10,
            "shippingAddress": {"city": "Kandy"}
        }));
        assert!(matches!(validate_order(negative_unit), Err(AppError::BadRequest(_))));

        let negative_total = request(json!({
            "userId": "u1",
            "items": [{"gameId": "g-1", "unitPrice": 5, "totalPrice": -5}],
            "totalAmount": 10,
            "shippingAddress": {"city": "Kandy"}
        }));
        assert!(matches!(validate_order(negative_total), Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn empty_items_write_nothing() {
        let stores = TestStores::new(None);
        let state = stores.state();

        let err = create_order(
            &state,
            request(json!({
                "userId": "u1",
                "items": [],
                "totalAmount": 10,
                "shippingAddress": {"city": "Kandy"}
            })),
        )
        .await
        .expect_err("no items");

        assert!(matches!(err, AppError::Validation { .. }));
        assert!(stores.orders.orders().is_empty());
        assert_eq!(stores.orders.commits(), 0);
        assert_eq!(stores.orders.rollbacks(), 0);
    }

    #[tokio::test]
    async fn lines_are_numbered_in_submitted_order() {
        let stores = TestStores::new(None);
        let state = stores.state();

        let order = create_order(&state, two_item_order()).await.expect("created");

        let positions: Vec<i32> = order.items.iter().map(|item| item.position).collect();
        assert_eq!(positions, vec![0, 1]);
        assert_eq!(order.items[0].game_id, "g-1");
    }

    #[tokio::test]
    async fn order_and_items_are_committed_together() {
        let stores = TestStores::new(None);
        let state = stores.state();

        let order = create_order(&state, two_item_order()).await.expect("created");

        assert!(is_order_number(&order.order_number));
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.items.len(), 2);
        assert_eq!(stores.orders.orders().len(), 1);
        assert_eq!(stores.orders.item_count(), 2);
    }

    #[tokio::test]
    async fn failing_item_leaves_no_header_or_lines() {
        let stores = TestStores::new(None);
        stores.orders.fail_item_at(1);
        let state = stores.state();

        let err = create_order(&state, two_item_order()).await.expect_err("item failure");

        assert_eq!(err.to_string(), "Failed to create order");
        assert!(stores.orders.orders().is_empty());
        assert_eq!(stores.orders.item_count(), 0);
        assert_eq!(stores.orders.rollbacks(), 1);
        assert_eq!(stores.orders.commits(), 0);
    }

    #[tokio::test]
    async fn order_number_collision_is_retried() {
        let stores = TestStores::new(None);
        stores.orders.collide_next(1);
        let state = stores.state();

        let order = create_order(&state, two_item_order()).await.expect("created on retry");

        assert_eq!(stores.orders.rollbacks(), 1);
        assert_eq!(stores.orders.orders().len(), 1);
        assert_eq!(stores.orders.orders()[0].order_number, order.order_number);
    }

    #[tokio::test]
    async fn repeated_collisions_give_up() {
        let stores = TestStores::new(None);
        stores.orders.collide_next(MAX_ORDER_NUMBER_ATTEMPTS);
        let state = stores.state();

        let err = create_order(&state, two_item_order()).await.expect_err("exhausted");

        assert!(matches!(err, AppError::Primary { .. }));
        assert!(stores.orders.orders().is_empty());
    }

    #[tokio::test]
    async fn status_update_validates_status_and_id() {
        let stores = TestStores::new(None);
        let state = stores.state();
        let order = stores.orders.seed("u1", OrderStatus::Pending);

        let unknown_status = StatusUpdateRequest {
            status: Some("teleported".to_string()),
        };
        let err = update_order_status(&state, &order.id.to_string(), unknown_status)
            .await
            .expect_err("bad status");
        assert!(matches!(err, AppError::BadRequest(_)));

        let shipped = || StatusUpdateRequest {
            status: Some("shipped".to_string()),
        };
        let err = update_order_status(&state, &Uuid::new_v4().to_string(), shipped())
            .await
            .expect_err("missing order");
        assert!(matches!(err, AppError::NotFound(_)));

        let err = update_order_status(&state, "not-a-uuid", shipped())
            .await
            .expect_err("malformed id");
        assert!(matches!(err, AppError::NotFound(_)));

        let change = update_order_status(&state, &order.id.to_string(), shipped())
            .await
            .expect("updated");
        assert_eq!(change.status, OrderStatus::Shipped);
    }

    #[tokio::test]
    async fn cancelling_keeps_the_order() {
        let stores = TestStores::new(None);
        let state = stores.state();
        let order = stores.orders.seed("u1", OrderStatus::Processing);

        let change = cancel_order(&state, &order.id.to_string()).await.expect("cancelled");

        assert_eq!(change.status, OrderStatus::Cancelled);
        assert_eq!(stores.orders.orders().len(), 1);
        assert_eq!(stores.orders.orders()[0].status, OrderStatus::Cancelled);

        let err = cancel_order(&state, &Uuid::new_v4().to_string())
            .await
            .expect_err("missing order");
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn delivered_order_cannot_be_cancelled_when_enforced() {
        let stores = TestStores::new(None);
        let mut state = stores.state();
        state.config.enforce_status_transitions = true;
        let order = stores.orders.seed("u1", OrderStatus::Delivered);

        let err = cancel_order(&state, &order.id.to_string())
            .await
            .expect_err("delivered is terminal");

        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(stores.orders.orders()[0].status, OrderStatus::Delivered);
    }

    #[tokio::test]
    async fn any_transition_is_allowed_by_default() {
        let stores = TestStores::new(None);
        let state = stores.state();
        let order = stores.orders.seed("u1", OrderStatus::Delivered);

        let change = update_order_status(
            &state,
            &order.id.to_string(),
            StatusUpdateRequest {
                status: Some("pending".to_string()),
            },
        )
        .await
        .expect("unconstrained");
        assert_eq!(change.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn illegal_transition_conflicts_when_enforced() {
        let stores = TestStores::new(None);
        let mut state = stores.state();
        state.config.enforce_status_transitions = true;
        let order = stores.orders.seed("u1", OrderStatus::Delivered);

        let err = update_order_status(
            &state,
            &order.id.to_string(),
            StatusUpdateRequest {
                status: Some("processing".to_string()),
            },
        )
        .await
        .expect_err("delivered is terminal");
        assert!(matches!(err, AppError::Conflict(_)));

        let pending = stores.orders.seed("u2", OrderStatus::Pending);
        let change = update_order_status(
            &state,
            &pending.id.to_string(),
            StatusUpdateRequest {
                status: Some("Cancelled".to_string()),
            },
        )
        .await
        .expect("cancel allowed");
        assert_eq!(change.status, OrderStatus::Cancelled);
    }
}
