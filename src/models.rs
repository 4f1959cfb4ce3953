// src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub phone: Option<String>,
    pub language: Option<String>,
    pub location: Option<String>,
    pub cash_balance: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Stock {
    pub id: i64,
    pub symbol: String,
    pub company_name: String,
    pub current_price: f64,
    pub sector: Option<String>,
    pub market_cap: Option<f64>,
    pub volume: Option<i64>,
    pub exchange: Option<String>,
    pub price_updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Holding {
    pub id: i64,
    pub user_id: i64,
    pub stock_id: i64,
    pub quantity: i64,
    pub average_cost: f64,
}

/// Holding joined with the stock it refers to.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct HoldingDetail {
    pub id: i64,
    pub user_id: i64,
    pub stock_id: i64,
    pub symbol: String,
    pub company_name: String,
    pub quantity: i64,
    pub average_cost: f64,
    pub current_price: f64,
    pub price_updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Order {
    pub id: i64,
    pub user_id: i64,
    pub stock_id: i64,
    pub order_type: String, // "BUY" or "SELL"
    pub quantity: i64,
    pub price_per_share: f64,
    pub total_value: f64,
    pub status: String, // "PENDING", "EXECUTED" or "CANCELLED"
    pub duration: String,
    pub created_at: DateTime<Utc>,
}

/// Order row with the display fields the order listing shows.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OrderDetail {
    pub id: i64,
    pub user_id: i64,
    pub user_name: String,
    pub stock_id: i64,
    pub symbol: String,
    pub company_name: String,
    pub order_type: String,
    pub quantity: i64,
    pub price_per_share: f64,
    pub total_value: f64,
    pub status: String,
    pub duration: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct WatchlistItem {
    pub id: i64,
    pub user_id: i64,
    pub stock_id: i64,
    pub name: Option<String>,
    pub symbol: String,
    pub company_name: String,
    pub current_price: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct NetWorthSnapshot {
    pub id: i64,
    pub user_id: i64,
    pub total_balance: f64,
    pub stock_value: f64,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderType {
    Buy,
    Sell,
}

impl OrderType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "BUY" => Some(OrderType::Buy),
            "SELL" => Some(OrderType::Sell),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Buy => "BUY",
            OrderType::Sell => "SELL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Pending,
    Executed,
    Cancelled,
}

impl OrderStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(OrderStatus::Pending),
            "EXECUTED" => Some(OrderStatus::Executed),
            "CANCELLED" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Executed => "EXECUTED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

// Request payloads. Every field is optional so presence is checked by the
// handlers and reported with a stable message instead of a parse failure.

/// Signup and profile update body.
#[derive(Debug, Default, Deserialize)]
pub struct UserPayload {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub phone: Option<String>,
    pub language: Option<String>,
    pub location: Option<String>,
    pub cash_balance: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub name: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StockPayload {
    pub symbol: Option<String>,
    pub company_name: Option<String>,
    pub current_price: Option<f64>,
    pub sector: Option<String>,
    pub market_cap: Option<f64>,
    pub volume: Option<i64>,
    pub exchange: Option<String>,
}

/// Order body. The required fields stay untyped JSON so a wrong type is
/// reported by order validation rather than by the body parser.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub user_id: Option<Value>,
    pub stock_id: Option<Value>,
    pub order_type: Option<Value>,
    pub quantity: Option<Value>,
    pub price_per_share: Option<Value>,
    pub duration: Option<String>,
}

/// An order payload that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedOrder {
    pub user_id: i64,
    pub stock_id: i64,
    pub order_type: OrderType,
    pub quantity: i64,
    pub price_per_share: f64,
    pub duration: String,
}

impl ValidatedOrder {
    pub fn total_value(&self) -> f64 {
        self.quantity as f64 * self.price_per_share
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderStatusUpdate {
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NewHolding {
    pub user_id: Option<i64>,
    pub stock_id: Option<i64>,
    pub quantity: Option<i64>,
    pub average_cost: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HoldingUpdate {
    pub quantity: Option<i64>,
    pub average_cost: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NewWatchlistItem {
    pub stock_id: Option<i64>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PortfolioHolding {
    pub holding_id: i64,
    pub stock_id: i64,
    pub symbol: String,
    pub company_name: String,
    pub quantity: i64,
    pub average_cost: f64,
    pub current_price: f64,
    pub market_value: f64,
    pub price_updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PortfolioSummary {
    pub total_value: f64,
    pub cash_balance: f64,
    pub stock_value: f64,
    pub holdings: Vec<PortfolioHolding>,
    pub last_updated: DateTime<Utc>,
}

/// Validated user fields, written on signup and profile updates.
#[derive(Debug, Clone)]
pub struct UserInput {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    pub language: Option<String>,
    pub location: Option<String>,
    pub cash_balance: f64,
}

impl From<User> for UserInput {
    fn from(user: User) -> Self {
        Self {
            name: user.name,
            email: user.email,
            password: user.password,
            phone: user.phone,
            language: user.language,
            location: user.location,
            cash_balance: user.cash_balance,
        }
    }
}

/// Validated stock fields.
#[derive(Debug, Clone)]
pub struct StockInput {
    pub symbol: String,
    pub company_name: String,
    pub current_price: f64,
    pub sector: Option<String>,
    pub market_cap: Option<f64>,
    pub volume: Option<i64>,
    pub exchange: Option<String>,
}

impl From<Stock> for StockInput {
    fn from(stock: Stock) -> Self {
        Self {
            symbol: stock.symbol,
            company_name: stock.company_name,
            current_price: stock.current_price,
            sector: stock.sector,
            market_cap: stock.market_cap,
            volume: stock.volume,
            exchange: stock.exchange,
        }
    }
}
