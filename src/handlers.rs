// src/handlers.rs
use crate::db::{self, DbPool};
use crate::error::ApiError;
use crate::models::{
    CreateOrderRequest, HoldingUpdate, LoginRequest, NewHolding, NewWatchlistItem, OrderStatus,
    OrderStatusUpdate, Stock, StockInput, StockPayload, User, UserInput, UserPayload,
};
use crate::{orders, portfolio};
use log::{error, info, warn};
use serde_json::json;
use warp::http::StatusCode;
use warp::{Rejection, Reply};

fn created<T: serde::Serialize>(body: &T) -> impl Reply {
    warp::reply::with_status(warp::reply::json(body), StatusCode::CREATED)
}

fn message(text: &str) -> impl Reply {
    warp::reply::json(&json!({ "message": text }))
}

/// Treats absent and blank strings alike.
fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

async fn require_user(pool: &DbPool, user_id: i64) -> Result<User, ApiError> {
    db::get_user(pool, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))
}

// ---- users ----

fn check_cash(cash_balance: f64) -> Result<f64, ApiError> {
    if cash_balance.is_nan() || cash_balance < 0.0 {
        return Err(ApiError::bad_request("Cash balance cannot be negative"));
    }
    Ok(cash_balance)
}

pub fn new_user_input(payload: UserPayload) -> Result<UserInput, ApiError> {
    let (Some(name), Some(email), Some(password)) = (
        present(payload.name),
        present(payload.email),
        present(payload.password),
    ) else {
        return Err(ApiError::bad_request("Missing required fields"));
    };

    Ok(UserInput {
        name,
        email,
        password,
        phone: present(payload.phone),
        language: present(payload.language),
        location: present(payload.location),
        cash_balance: check_cash(payload.cash_balance.unwrap_or(0.0))?,
    })
}

pub fn merge_user_input(existing: User, payload: UserPayload) -> Result<UserInput, ApiError> {
    let mut input = UserInput::from(existing);
    if let Some(name) = present(payload.name) {
        input.name = name;
    }
    if let Some(email) = present(payload.email) {
        input.email = email;
    }
    if let Some(password) = present(payload.password) {
        input.password = password;
    }
    if payload.phone.is_some() {
        input.phone = present(payload.phone);
    }
    if payload.language.is_some() {
        input.language = present(payload.language);
    }
    if payload.location.is_some() {
        input.location = present(payload.location);
    }
    if let Some(cash_balance) = payload.cash_balance {
        input.cash_balance = check_cash(cash_balance)?;
    }
    Ok(input)
}

pub async fn list_users_handler(pool: DbPool) -> Result<impl Reply, Rejection> {
    match db::list_users(&pool).await {
        Ok(users) => Ok(warp::reply::json(&users)),
        Err(e) => {
            error!("Failed to list users: {}", e);
            Err(ApiError::from(e).into())
        }
    }
}

pub async fn create_user_handler(
    pool: DbPool,
    payload: UserPayload,
) -> Result<impl Reply, Rejection> {
    let input = new_user_input(payload)?;
    match db::create_user(&pool, &input).await {
        Ok(user) => {
            info!("User {} signed up.", user.id);
            Ok(created(&user))
        }
        Err(e) => {
            error!("Failed to create user {}: {}", input.email, e);
            Err(ApiError::from(e).into())
        }
    }
}

pub async fn get_user_handler(user_id: i64, pool: DbPool) -> Result<impl Reply, Rejection> {
    let user = require_user(&pool, user_id).await?;
    Ok(warp::reply::json(&user))
}

pub async fn update_user_handler(
    user_id: i64,
    pool: DbPool,
    payload: UserPayload,
) -> Result<impl Reply, Rejection> {
    let existing = require_user(&pool, user_id).await?;
    let input = merge_user_input(existing, payload)?;
    match db::update_user(&pool, user_id, &input).await {
        Ok(Some(user)) => {
            info!("User {} updated.", user_id);
            Ok(warp::reply::json(&user))
        }
        Ok(None) => Err(ApiError::not_found("User not found").into()),
        Err(e) => {
            error!("Failed to update user {}: {}", user_id, e);
            Err(ApiError::from(e).into())
        }
    }
}

pub async fn delete_user_handler(user_id: i64, pool: DbPool) -> Result<impl Reply, Rejection> {
    match db::delete_user(&pool, user_id).await {
        Ok(true) => {
            info!("User {} deleted.", user_id);
            Ok(message("User deleted"))
        }
        Ok(false) => Err(ApiError::not_found("User not found").into()),
        Err(e) => {
            error!("Failed to delete user {}: {}", user_id, e);
            Err(ApiError::from(e).into())
        }
    }
}

/// Plaintext lookup; answers with the bare user id.
pub async fn login_handler(pool: DbPool, req: LoginRequest) -> Result<impl Reply, Rejection> {
    let identifier = present(req.email).or_else(|| present(req.name));
    let (Some(identifier), Some(password)) = (identifier, req.password.filter(|p| !p.is_empty()))
    else {
        return Err(ApiError::bad_request("Missing required fields").into());
    };

    match db::find_login(&pool, &identifier, &password).await {
        Ok(Some(user_id)) => {
            info!("User {} logged in.", user_id);
            Ok(warp::reply::json(&json!({ "user_id": user_id })))
        }
        Ok(None) => {
            warn!("Failed login for {}", identifier);
            Err(ApiError::Unauthorized("Invalid credentials".to_string()).into())
        }
        Err(e) => {
            error!("Login lookup failed: {}", e);
            Err(ApiError::from(e).into())
        }
    }
}

// ---- stocks ----

fn normalize_symbol(symbol: &str) -> Result<String, ApiError> {
    let symbol = symbol.trim().to_ascii_uppercase();
    if symbol.is_empty() || symbol.len() > 5 || !symbol.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(ApiError::bad_request("Invalid stock symbol"));
    }
    Ok(symbol)
}

fn check_price(price: f64) -> Result<f64, ApiError> {
    if price.is_nan() || price <= 0.0 {
        return Err(ApiError::bad_request("Price must be positive"));
    }
    Ok(price)
}

pub fn new_stock_input(payload: StockPayload) -> Result<StockInput, ApiError> {
    let (Some(symbol), Some(company_name), Some(current_price)) = (
        present(payload.symbol),
        present(payload.company_name),
        payload.current_price,
    ) else {
        return Err(ApiError::bad_request("Missing required fields"));
    };

    Ok(StockInput {
        symbol: normalize_symbol(&symbol)?,
        company_name,
        current_price: check_price(current_price)?,
        sector: present(payload.sector),
        market_cap: payload.market_cap,
        volume: payload.volume,
        exchange: present(payload.exchange),
    })
}

pub fn merge_stock_input(existing: Stock, payload: StockPayload) -> Result<StockInput, ApiError> {
    let mut input = StockInput::from(existing);
    if let Some(symbol) = present(payload.symbol) {
        input.symbol = normalize_symbol(&symbol)?;
    }
    if let Some(company_name) = present(payload.company_name) {
        input.company_name = company_name;
    }
    if let Some(price) = payload.current_price {
        input.current_price = check_price(price)?;
    }
    if payload.sector.is_some() {
        input.sector = present(payload.sector);
    }
    if payload.market_cap.is_some() {
        input.market_cap = payload.market_cap;
    }
    if payload.volume.is_some() {
        input.volume = payload.volume;
    }
    if payload.exchange.is_some() {
        input.exchange = present(payload.exchange);
    }
    Ok(input)
}

pub async fn list_stocks_handler(pool: DbPool) -> Result<impl Reply, Rejection> {
    match db::list_stocks(&pool).await {
        Ok(stocks) => Ok(warp::reply::json(&stocks)),
        Err(e) => {
            error!("Failed to list stocks: {}", e);
            Err(ApiError::from(e).into())
        }
    }
}

pub async fn create_stock_handler(
    pool: DbPool,
    payload: StockPayload,
) -> Result<impl Reply, Rejection> {
    let input = new_stock_input(payload)?;
    match db::create_stock(&pool, &input).await {
        Ok(stock) => {
            info!("Stock {} listed.", stock.symbol);
            Ok(created(&stock))
        }
        Err(e) => {
            error!("Failed to create stock {}: {}", input.symbol, e);
            Err(ApiError::from(e).into())
        }
    }
}

pub async fn get_stock_handler(stock_id: i64, pool: DbPool) -> Result<impl Reply, Rejection> {
    match db::get_stock(&pool, stock_id).await.map_err(ApiError::from)? {
        Some(stock) => Ok(warp::reply::json(&stock)),
        None => Err(ApiError::not_found("Stock not found").into()),
    }
}

pub async fn update_stock_handler(
    stock_id: i64,
    pool: DbPool,
    payload: StockPayload,
) -> Result<impl Reply, Rejection> {
    let existing = db::get_stock(&pool, stock_id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::not_found("Stock not found"))?;
    let input = merge_stock_input(existing, payload)?;
    match db::update_stock(&pool, stock_id, &input).await {
        Ok(Some(stock)) => {
            info!("Stock {} updated at {:.2}.", stock.symbol, stock.current_price);
            Ok(warp::reply::json(&stock))
        }
        Ok(None) => Err(ApiError::not_found("Stock not found").into()),
        Err(e) => {
            error!("Failed to update stock {}: {}", stock_id, e);
            Err(ApiError::from(e).into())
        }
    }
}

pub async fn delete_stock_handler(stock_id: i64, pool: DbPool) -> Result<impl Reply, Rejection> {
    match db::delete_stock(&pool, stock_id).await {
        Ok(true) => {
            info!("Stock {} deleted.", stock_id);
            Ok(message("Stock deleted"))
        }
        Ok(false) => Err(ApiError::not_found("Stock not found").into()),
        Err(e) => {
            error!("Failed to delete stock {}: {}", stock_id, e);
            Err(ApiError::from(e).into())
        }
    }
}

// ---- orders ----

pub async fn create_order_handler(
    pool: DbPool,
    req: CreateOrderRequest,
) -> Result<impl Reply, Rejection> {
    match orders::place_order(&pool, &req).await {
        Ok(order) => {
            info!(
                "Order {} placed: {} {} @ {:.2}",
                order.id, order.order_type, order.quantity, order.price_per_share
            );
            Ok(created(&order))
        }
        Err(e) => {
            warn!("Order rejected: {}", e);
            Err(ApiError::from(e).into())
        }
    }
}

pub async fn list_orders_handler(pool: DbPool) -> Result<impl Reply, Rejection> {
    match db::list_orders(&pool).await {
        Ok(orders) => Ok(warp::reply::json(&orders)),
        Err(e) => {
            error!("Failed to list orders: {}", e);
            Err(ApiError::from(e).into())
        }
    }
}

pub async fn get_order_handler(order_id: i64, pool: DbPool) -> Result<impl Reply, Rejection> {
    match db::get_order(&pool, order_id).await.map_err(ApiError::from)? {
        Some(order) => Ok(warp::reply::json(&order)),
        None => Err(ApiError::not_found("Order not found").into()),
    }
}

/// Moves an order between PENDING, EXECUTED and CANCELLED. Cash and
/// holdings are left as they are.
pub async fn update_order_handler(
    order_id: i64,
    pool: DbPool,
    update: OrderStatusUpdate,
) -> Result<impl Reply, Rejection> {
    let Some(status) = present(update.status) else {
        return Err(ApiError::bad_request("Missing required fields").into());
    };
    let status = OrderStatus::parse(&status)
        .ok_or_else(|| ApiError::bad_request("Invalid order status"))?;

    match db::update_order_status(&pool, order_id, status.as_str()).await {
        Ok(Some(order)) => {
            info!("Order {} is now {}.", order_id, order.status);
            Ok(warp::reply::json(&order))
        }
        Ok(None) => Err(ApiError::not_found("Order not found").into()),
        Err(e) => {
            error!("Failed to update order {}: {}", order_id, e);
            Err(ApiError::from(e).into())
        }
    }
}

pub async fn delete_order_handler(order_id: i64, pool: DbPool) -> Result<impl Reply, Rejection> {
    match db::delete_order(&pool, order_id).await {
        Ok(true) => {
            info!("Order {} deleted.", order_id);
            Ok(message("Order deleted"))
        }
        Ok(false) => Err(ApiError::not_found("Order not found").into()),
        Err(e) => {
            error!("Failed to delete order {}: {}", order_id, e);
            Err(ApiError::from(e).into())
        }
    }
}

pub async fn user_orders_handler(user_id: i64, pool: DbPool) -> Result<impl Reply, Rejection> {
    require_user(&pool, user_id).await?;
    let orders = db::list_user_orders(&pool, user_id)
        .await
        .map_err(ApiError::from)?;
    Ok(warp::reply::json(&orders))
}

// ---- holdings ----

fn check_holding(quantity: i64, average_cost: f64) -> Result<(), ApiError> {
    if quantity < 0 {
        return Err(ApiError::bad_request("Quantity cannot be negative"));
    }
    if average_cost.is_nan() || average_cost < 0.0 {
        return Err(ApiError::bad_request("Average cost cannot be negative"));
    }
    Ok(())
}

pub async fn list_holdings_handler(pool: DbPool) -> Result<impl Reply, Rejection> {
    let holdings = db::list_holdings(&pool).await.map_err(ApiError::from)?;
    Ok(warp::reply::json(&holdings))
}

pub async fn create_holding_handler(
    pool: DbPool,
    req: NewHolding,
) -> Result<impl Reply, Rejection> {
    let (Some(user_id), Some(stock_id), Some(quantity), Some(average_cost)) =
        (req.user_id, req.stock_id, req.quantity, req.average_cost)
    else {
        return Err(ApiError::bad_request("Missing required fields").into());
    };
    check_holding(quantity, average_cost)?;

    if db::get_user(&pool, user_id).await.map_err(ApiError::from)?.is_none() {
        return Err(ApiError::bad_request("User not found").into());
    }
    if db::get_stock(&pool, stock_id).await.map_err(ApiError::from)?.is_none() {
        return Err(ApiError::bad_request("Stock not found").into());
    }

    match db::create_holding(&pool, user_id, stock_id, quantity, average_cost).await {
        Ok(holding) => {
            info!("Holding {} created for user {}.", holding.id, user_id);
            Ok(created(&holding))
        }
        Err(e) => {
            error!("Failed to create holding for user {}: {}", user_id, e);
            Err(ApiError::from(e).into())
        }
    }
}

pub async fn get_holding_handler(holding_id: i64, pool: DbPool) -> Result<impl Reply, Rejection> {
    match db::get_holding(&pool, holding_id).await.map_err(ApiError::from)? {
        Some(holding) => Ok(warp::reply::json(&holding)),
        None => Err(ApiError::not_found("Holding not found").into()),
    }
}

pub async fn update_holding_handler(
    holding_id: i64,
    pool: DbPool,
    update: HoldingUpdate,
) -> Result<impl Reply, Rejection> {
    let existing = db::get_holding(&pool, holding_id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::not_found("Holding not found"))?;
    let quantity = update.quantity.unwrap_or(existing.quantity);
    let average_cost = update.average_cost.unwrap_or(existing.average_cost);
    check_holding(quantity, average_cost)?;

    match db::update_holding(&pool, holding_id, quantity, average_cost).await {
        Ok(Some(holding)) => Ok(warp::reply::json(&holding)),
        Ok(None) => Err(ApiError::not_found("Holding not found").into()),
        Err(e) => {
            error!("Failed to update holding {}: {}", holding_id, e);
            Err(ApiError::from(e).into())
        }
    }
}

pub async fn delete_holding_handler(
    holding_id: i64,
    pool: DbPool,
) -> Result<impl Reply, Rejection> {
    match db::delete_holding(&pool, holding_id).await {
        Ok(true) => Ok(message("Holding deleted")),
        Ok(false) => Err(ApiError::not_found("Holding not found").into()),
        Err(e) => {
            error!("Failed to delete holding {}: {}", holding_id, e);
            Err(ApiError::from(e).into())
        }
    }
}

pub async fn user_holdings_handler(user_id: i64, pool: DbPool) -> Result<impl Reply, Rejection> {
    require_user(&pool, user_id).await?;
    let holdings = db::list_user_holdings(&pool, user_id)
        .await
        .map_err(ApiError::from)?;
    Ok(warp::reply::json(&holdings))
}

// ---- watchlist ----

pub async fn list_watchlist_handler(user_id: i64, pool: DbPool) -> Result<impl Reply, Rejection> {
    require_user(&pool, user_id).await?;
    let items = db::list_watchlist(&pool, user_id)
        .await
        .map_err(ApiError::from)?;
    Ok(warp::reply::json(&items))
}

pub async fn add_watchlist_handler(
    user_id: i64,
    pool: DbPool,
    req: NewWatchlistItem,
) -> Result<impl Reply, Rejection> {
    require_user(&pool, user_id).await?;
    let Some(stock_id) = req.stock_id else {
        return Err(ApiError::bad_request("Missing required fields").into());
    };
    if db::get_stock(&pool, stock_id).await.map_err(ApiError::from)?.is_none() {
        return Err(ApiError::bad_request("Stock not found").into());
    }
    if db::watchlist_contains(&pool, user_id, stock_id)
        .await
        .map_err(ApiError::from)?
    {
        return Err(ApiError::bad_request("Stock already in watchlist").into());
    }

    let name = present(req.name);
    match db::insert_watchlist_item(&pool, user_id, stock_id, name.as_deref()).await {
        Ok(item) => {
            info!("Stock {} added to watchlist of user {}.", item.symbol, user_id);
            Ok(created(&item))
        }
        Err(e) => {
            error!("Failed to add stock {} to watchlist: {}", stock_id, e);
            Err(ApiError::from(e).into())
        }
    }
}

pub async fn remove_watchlist_handler(
    user_id: i64,
    stock_id: i64,
    pool: DbPool,
) -> Result<impl Reply, Rejection> {
    match db::delete_watchlist_item(&pool, user_id, stock_id).await {
        Ok(true) => Ok(message("Removed from watchlist")),
        Ok(false) => Err(ApiError::not_found("Watchlist item not found").into()),
        Err(e) => {
            error!("Failed to remove stock {} from watchlist: {}", stock_id, e);
            Err(ApiError::from(e).into())
        }
    }
}

// ---- net worth & portfolio ----

pub async fn net_worth_handler(user_id: i64, pool: DbPool) -> Result<impl Reply, Rejection> {
    require_user(&pool, user_id).await?;
    let history = db::list_net_worth(&pool, user_id)
        .await
        .map_err(ApiError::from)?;
    Ok(warp::reply::json(&history))
}

pub async fn portfolio_handler(user_id: i64, pool: DbPool) -> Result<impl Reply, Rejection> {
    match portfolio::summarize(&pool, user_id).await {
        Ok(Some(summary)) => {
            info!("Portfolio valued for user {}: {:.2}", user_id, summary.total_value);
            Ok(warp::reply::json(&summary))
        }
        Ok(None) => Err(ApiError::not_found("User not found").into()),
        Err(e) => {
            error!("Failed to value portfolio for user {}: {}", user_id, e);
            Err(ApiError::from(e).into())
        }
    }
}
