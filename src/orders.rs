// src/orders.rs
use crate::db::{self, DbPool};
use crate::error::OrderError;
use crate::models::{CreateOrderRequest, Order, OrderType, ValidatedOrder};
use log::warn;
use serde_json::Value;

pub const DEFAULT_DURATION: &str = "DAY";

fn present(field: &Option<Value>) -> Option<&Value> {
    field.as_ref().filter(|v| !v.is_null())
}

/// Whole share counts; `2.0` is accepted, `2.5` is not.
fn whole_number(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
            .map(|f| f as i64)
    })
}

/// Field checks, always in the same order: presence, order type, quantity,
/// price, then the user and stock ids. A value of the wrong JSON type fails
/// the check for its own field, so an id that is not an integer reads as an
/// unknown user or stock.
pub fn validate(req: &CreateOrderRequest) -> Result<ValidatedOrder, OrderError> {
    let (Some(user_id), Some(stock_id), Some(order_type), Some(quantity), Some(price_per_share)) = (
        present(&req.user_id),
        present(&req.stock_id),
        present(&req.order_type),
        present(&req.quantity),
        present(&req.price_per_share),
    ) else {
        return Err(OrderError::MissingFields);
    };

    let order_type = order_type
        .as_str()
        .and_then(OrderType::parse)
        .ok_or(OrderError::InvalidOrderType)?;
    let quantity = whole_number(quantity)
        .filter(|q| *q > 0)
        .ok_or(OrderError::NonPositiveQuantity)?;
    let price_per_share = price_per_share
        .as_f64()
        .filter(|p| *p > 0.0)
        .ok_or(OrderError::NonPositivePrice)?;
    let user_id = user_id.as_i64().ok_or(OrderError::UserNotFound)?;
    let stock_id = stock_id.as_i64().ok_or(OrderError::StockNotFound)?;

    let duration = match req.duration.as_deref().map(str::trim) {
        Some(d) if !d.is_empty() => d.to_string(),
        _ => DEFAULT_DURATION.to_string(),
    };

    Ok(ValidatedOrder {
        user_id,
        stock_id,
        order_type,
        quantity,
        price_per_share,
        duration,
    })
}

/// Validates, resolves references, checks cash or shares, then inserts a
/// PENDING order.
///
/// The affordability check and the insert are separate statements with no
/// reservation in between, so concurrent orders can each pass against the
/// same balance.
pub async fn place_order(pool: &DbPool, req: &CreateOrderRequest) -> Result<Order, OrderError> {
    let order = validate(req)?;

    let user = db::get_user(pool, order.user_id)
        .await?
        .ok_or(OrderError::UserNotFound)?;
    db::get_stock(pool, order.stock_id)
        .await?
        .ok_or(OrderError::StockNotFound)?;

    match order.order_type {
        OrderType::Buy => {
            let cost = order.total_value();
            if cost > user.cash_balance {
                warn!(
                    "User {} cannot afford {:.2} with cash balance {:.2}",
                    user.id, cost, user.cash_balance
                );
                return Err(OrderError::InsufficientFunds);
            }
        }
        OrderType::Sell => {
            let held = db::holding_quantity(pool, order.user_id, order.stock_id).await?;
            if order.quantity > held {
                warn!(
                    "User {} cannot sell {} shares of stock {}, holds {}",
                    user.id, order.quantity, order.stock_id, held
                );
                return Err(OrderError::InsufficientShares);
            }
        }
    }

    let created = db::insert_order(pool, &order).await?;
    Ok(created)
}
