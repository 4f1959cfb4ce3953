// src/db.rs
use crate::config::Config;
use crate::models::{
    Holding, HoldingDetail, NetWorthSnapshot, Order, OrderDetail, Stock, StockInput, User,
    UserInput, ValidatedOrder, WatchlistItem,
};
use chrono::Utc;
use log::{debug, info};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

pub type DbPool = SqlitePool;

const SCHEMA: [&str; 6] = [
    "CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        password TEXT NOT NULL,
        phone TEXT,
        language TEXT,
        location TEXT,
        cash_balance REAL NOT NULL DEFAULT 0 CHECK(cash_balance >= 0),
        created_at DATETIME NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS stocks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        symbol TEXT NOT NULL UNIQUE,
        company_name TEXT NOT NULL,
        current_price REAL NOT NULL CHECK(current_price > 0),
        sector TEXT,
        market_cap REAL,
        volume INTEGER,
        exchange TEXT,
        price_updated_at DATETIME NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS holdings (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        stock_id INTEGER NOT NULL REFERENCES stocks(id) ON DELETE CASCADE,
        quantity INTEGER NOT NULL CHECK(quantity >= 0),
        average_cost REAL NOT NULL CHECK(average_cost >= 0),
        UNIQUE (user_id, stock_id)
    )",
    "CREATE TABLE IF NOT EXISTS orders (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        stock_id INTEGER NOT NULL REFERENCES stocks(id) ON DELETE CASCADE,
        order_type TEXT NOT NULL CHECK(order_type IN ('BUY', 'SELL')),
        quantity INTEGER NOT NULL CHECK(quantity > 0),
        price_per_share REAL NOT NULL CHECK(price_per_share > 0),
        total_value REAL NOT NULL,
        status TEXT NOT NULL CHECK(status IN ('PENDING', 'EXECUTED', 'CANCELLED')),
        duration TEXT NOT NULL DEFAULT 'DAY',
        created_at DATETIME NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS watchlist (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        stock_id INTEGER NOT NULL REFERENCES stocks(id) ON DELETE CASCADE,
        name TEXT,
        created_at DATETIME NOT NULL,
        UNIQUE (user_id, stock_id)
    )",
    "CREATE TABLE IF NOT EXISTS net_worth (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        total_balance REAL NOT NULL,
        stock_value REAL NOT NULL,
        recorded_at DATETIME NOT NULL
    )",
];

pub async fn init(config: &Config) -> Result<DbPool, sqlx::Error> {
    if let Some(db_path) = config.database_url.strip_prefix("sqlite://") {
        if let Some(parent) = Path::new(db_path).parent() {
            std::fs::create_dir_all(parent).map_err(|e| sqlx::Error::Configuration(Box::new(e)))?;
        }
    }

    let pool = connect(&config.database_url, config.max_connections).await?;
    create_schema(&pool).await?;

    info!("Successfully connected to {}.", config.database_url);
    Ok(pool)
}

pub async fn connect(database_url: &str, max_connections: u32) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    // Each connection to "sqlite::memory:" opens its own empty database.
    let max_connections = if database_url.contains(":memory:") {
        1
    } else {
        max_connections
    };

    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
}

pub async fn create_schema(pool: &DbPool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_orders_created_at ON orders(created_at)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_holdings_user ON holdings(user_id)")
        .execute(pool)
        .await?;
    Ok(())
}

// ---- users ----

pub async fn list_users(pool: &DbPool) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY id")
        .fetch_all(pool)
        .await
}

pub async fn get_user(pool: &DbPool, id: i64) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn create_user(pool: &DbPool, user: &UserInput) -> Result<User, sqlx::Error> {
    let created = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (name, email, password, phone, language, location, cash_balance, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        RETURNING *
        "#,
    )
    .bind(&user.name)
    .bind(&user.email)
    .bind(&user.password)
    .bind(&user.phone)
    .bind(&user.language)
    .bind(&user.location)
    .bind(user.cash_balance)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    debug!("Created user {} <{}>", created.id, created.email);
    Ok(created)
}

pub async fn update_user(
    pool: &DbPool,
    id: i64,
    user: &UserInput,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        r#"
        UPDATE users
        SET name = ?1, email = ?2, password = ?3, phone = ?4, language = ?5,
            location = ?6, cash_balance = ?7
        WHERE id = ?8
        RETURNING *
        "#,
    )
    .bind(&user.name)
    .bind(&user.email)
    .bind(&user.password)
    .bind(&user.phone)
    .bind(&user.language)
    .bind(&user.location)
    .bind(user.cash_balance)
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn delete_user(pool: &DbPool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM users WHERE id = ?1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Plaintext credential lookup by email or by name.
pub async fn find_login(
    pool: &DbPool,
    identifier: &str,
    password: &str,
) -> Result<Option<i64>, sqlx::Error> {
    let row: Option<(i64,)> = sqlx::query_as(
        "SELECT id FROM users WHERE (email = ?1 OR name = ?1) AND password = ?2 ORDER BY id LIMIT 1",
    )
    .bind(identifier)
    .bind(password)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|(id,)| id))
}

// ---- stocks ----

pub async fn list_stocks(pool: &DbPool) -> Result<Vec<Stock>, sqlx::Error> {
    sqlx::query_as::<_, Stock>("SELECT * FROM stocks ORDER BY symbol ASC")
        .fetch_all(pool)
        .await
}

pub async fn get_stock(pool: &DbPool, id: i64) -> Result<Option<Stock>, sqlx::Error> {
    sqlx::query_as::<_, Stock>("SELECT * FROM stocks WHERE id = ?1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn create_stock(pool: &DbPool, stock: &StockInput) -> Result<Stock, sqlx::Error> {
    let created = sqlx::query_as::<_, Stock>(
        r#"
        INSERT INTO stocks (symbol, company_name, current_price, sector, market_cap, volume, exchange, price_updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        RETURNING *
        "#,
    )
    .bind(&stock.symbol)
    .bind(&stock.company_name)
    .bind(stock.current_price)
    .bind(&stock.sector)
    .bind(stock.market_cap)
    .bind(stock.volume)
    .bind(&stock.exchange)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    debug!("Created stock {} ({})", created.id, created.symbol);
    Ok(created)
}

/// Rewrites a stock row. `price_updated_at` only moves when the price does.
pub async fn update_stock(
    pool: &DbPool,
    id: i64,
    stock: &StockInput,
) -> Result<Option<Stock>, sqlx::Error> {
    sqlx::query_as::<_, Stock>(
        r#"
        UPDATE stocks
        SET symbol = ?1, company_name = ?2, sector = ?4, market_cap = ?5,
            volume = ?6, exchange = ?7,
            price_updated_at = CASE WHEN current_price = ?3 THEN price_updated_at ELSE ?8 END,
            current_price = ?3
        WHERE id = ?9
        RETURNING *
        "#,
    )
    .bind(&stock.symbol)
    .bind(&stock.company_name)
    .bind(stock.current_price)
    .bind(&stock.sector)
    .bind(stock.market_cap)
    .bind(stock.volume)
    .bind(&stock.exchange)
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn delete_stock(pool: &DbPool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM stocks WHERE id = ?1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

// ---- holdings ----

pub async fn list_holdings(pool: &DbPool) -> Result<Vec<Holding>, sqlx::Error> {
    sqlx::query_as::<_, Holding>("SELECT * FROM holdings ORDER BY id")
        .fetch_all(pool)
        .await
}

pub async fn get_holding(pool: &DbPool, id: i64) -> Result<Option<Holding>, sqlx::Error> {
    sqlx::query_as::<_, Holding>("SELECT * FROM holdings WHERE id = ?1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn create_holding(
    pool: &DbPool,
    user_id: i64,
    stock_id: i64,
    quantity: i64,
    average_cost: f64,
) -> Result<Holding, sqlx::Error> {
    sqlx::query_as::<_, Holding>(
        r#"
        INSERT INTO holdings (user_id, stock_id, quantity, average_cost)
        VALUES (?1, ?2, ?3, ?4)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(stock_id)
    .bind(quantity)
    .bind(average_cost)
    .fetch_one(pool)
    .await
}

pub async fn update_holding(
    pool: &DbPool,
    id: i64,
    quantity: i64,
    average_cost: f64,
) -> Result<Option<Holding>, sqlx::Error> {
    sqlx::query_as::<_, Holding>(
        "UPDATE holdings SET quantity = ?1, average_cost = ?2 WHERE id = ?3 RETURNING *",
    )
    .bind(quantity)
    .bind(average_cost)
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn delete_holding(pool: &DbPool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM holdings WHERE id = ?1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

const HOLDING_DETAIL_SELECT: &str = r#"
    SELECT h.id, h.user_id, h.stock_id, s.symbol, s.company_name, h.quantity,
           h.average_cost, s.current_price, s.price_updated_at
    FROM holdings h
    JOIN stocks s ON s.id = h.stock_id
"#;

pub async fn list_user_holdings(
    pool: &DbPool,
    user_id: i64,
) -> Result<Vec<HoldingDetail>, sqlx::Error> {
    let query = format!("{} WHERE h.user_id = ?1 ORDER BY s.symbol ASC", HOLDING_DETAIL_SELECT);
    sqlx::query_as::<_, HoldingDetail>(&query)
        .bind(user_id)
        .fetch_all(pool)
        .await
}

/// Holdings with a positive quantity, priced at the stocks' current prices.
pub async fn list_active_holdings(
    pool: &DbPool,
    user_id: i64,
) -> Result<Vec<HoldingDetail>, sqlx::Error> {
    let query = format!(
        "{} WHERE h.user_id = ?1 AND h.quantity > 0 ORDER BY s.symbol ASC",
        HOLDING_DETAIL_SELECT
    );
    sqlx::query_as::<_, HoldingDetail>(&query)
        .bind(user_id)
        .fetch_all(pool)
        .await
}

/// Shares of `stock_id` held by `user_id`; zero when there is no holding row.
pub async fn holding_quantity(
    pool: &DbPool,
    user_id: i64,
    stock_id: i64,
) -> Result<i64, sqlx::Error> {
    let row: Option<(i64,)> =
        sqlx::query_as("SELECT quantity FROM holdings WHERE user_id = ?1 AND stock_id = ?2")
            .bind(user_id)
            .bind(stock_id)
            .fetch_optional(pool)
            .await?;
    Ok(row.map(|(quantity,)| quantity).unwrap_or(0))
}

// ---- orders ----

pub async fn insert_order(pool: &DbPool, order: &ValidatedOrder) -> Result<Order, sqlx::Error> {
    let created = sqlx::query_as::<_, Order>(
        r#"
        INSERT INTO orders (user_id, stock_id, order_type, quantity, price_per_share,
                            total_value, status, duration, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'PENDING', ?7, ?8)
        RETURNING *
        "#,
    )
    .bind(order.user_id)
    .bind(order.stock_id)
    .bind(order.order_type.as_str())
    .bind(order.quantity)
    .bind(order.price_per_share)
    .bind(order.total_value())
    .bind(&order.duration)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    debug!(
        "Inserted order {}: {} {} x stock {} for user {}",
        created.id, created.order_type, created.quantity, created.stock_id, created.user_id
    );
    Ok(created)
}

const ORDER_DETAIL_SELECT: &str = r#"
    SELECT o.id, o.user_id, u.name AS user_name, o.stock_id, s.symbol, s.company_name,
           o.order_type, o.quantity, o.price_per_share, o.total_value, o.status,
           o.duration, o.created_at
    FROM orders o
    JOIN users u ON u.id = o.user_id
    JOIN stocks s ON s.id = o.stock_id
"#;

pub async fn list_orders(pool: &DbPool) -> Result<Vec<OrderDetail>, sqlx::Error> {
    let query = format!("{} ORDER BY o.created_at DESC, o.id DESC", ORDER_DETAIL_SELECT);
    sqlx::query_as::<_, OrderDetail>(&query).fetch_all(pool).await
}

pub async fn list_user_orders(
    pool: &DbPool,
    user_id: i64,
) -> Result<Vec<OrderDetail>, sqlx::Error> {
    let query = format!(
        "{} WHERE o.user_id = ?1 ORDER BY o.created_at DESC, o.id DESC",
        ORDER_DETAIL_SELECT
    );
    sqlx::query_as::<_, OrderDetail>(&query)
        .bind(user_id)
        .fetch_all(pool)
        .await
}

pub async fn get_order(pool: &DbPool, id: i64) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = ?1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn update_order_status(
    pool: &DbPool,
    id: i64,
    status: &str,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as::<_, Order>("UPDATE orders SET status = ?1 WHERE id = ?2 RETURNING *")
        .bind(status)
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn delete_order(pool: &DbPool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM orders WHERE id = ?1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

// ---- watchlist ----

const WATCHLIST_SELECT: &str = r#"
    SELECT w.id, w.user_id, w.stock_id, w.name, s.symbol, s.company_name,
           s.current_price, w.created_at
    FROM watchlist w
    JOIN stocks s ON s.id = w.stock_id
"#;

pub async fn list_watchlist(
    pool: &DbPool,
    user_id: i64,
) -> Result<Vec<WatchlistItem>, sqlx::Error> {
    let query = format!("{} WHERE w.user_id = ?1 ORDER BY s.symbol ASC", WATCHLIST_SELECT);
    sqlx::query_as::<_, WatchlistItem>(&query)
        .bind(user_id)
        .fetch_all(pool)
        .await
}

pub async fn watchlist_contains(
    pool: &DbPool,
    user_id: i64,
    stock_id: i64,
) -> Result<bool, sqlx::Error> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM watchlist WHERE user_id = ?1 AND stock_id = ?2")
            .bind(user_id)
            .bind(stock_id)
            .fetch_one(pool)
            .await?;
    Ok(count > 0)
}

pub async fn insert_watchlist_item(
    pool: &DbPool,
    user_id: i64,
    stock_id: i64,
    name: Option<&str>,
) -> Result<WatchlistItem, sqlx::Error> {
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO watchlist (user_id, stock_id, name, created_at) VALUES (?1, ?2, ?3, ?4) RETURNING id",
    )
    .bind(user_id)
    .bind(stock_id)
    .bind(name)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    let query = format!("{} WHERE w.id = ?1", WATCHLIST_SELECT);
    sqlx::query_as::<_, WatchlistItem>(&query)
        .bind(id)
        .fetch_one(pool)
        .await
}

pub async fn delete_watchlist_item(
    pool: &DbPool,
    user_id: i64,
    stock_id: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM watchlist WHERE user_id = ?1 AND stock_id = ?2")
        .bind(user_id)
        .bind(stock_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

// ---- net worth ----

pub async fn list_net_worth(
    pool: &DbPool,
    user_id: i64,
) -> Result<Vec<NetWorthSnapshot>, sqlx::Error> {
    sqlx::query_as::<_, NetWorthSnapshot>(
        "SELECT * FROM net_worth WHERE user_id = ?1 ORDER BY recorded_at ASC, id ASC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

// Snapshots are written by an external job; only tests insert them here.
#[cfg(test)]
pub async fn insert_net_worth(
    pool: &DbPool,
    user_id: i64,
    total_balance: f64,
    stock_value: f64,
    recorded_at: chrono::DateTime<Utc>,
) -> Result<NetWorthSnapshot, sqlx::Error> {
    sqlx::query_as::<_, NetWorthSnapshot>(
        r#"
        INSERT INTO net_worth (user_id, total_balance, stock_value, recorded_at)
        VALUES (?1, ?2, ?3, ?4)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(total_balance)
    .bind(stock_value)
    .bind(recorded_at)
    .fetch_one(pool)
    .await
}
