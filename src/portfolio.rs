// src/portfolio.rs
use crate::db::{self, DbPool};
use crate::models::{HoldingDetail, PortfolioHolding, PortfolioSummary};
use chrono::{DateTime, Utc};

/// Values a user's portfolio at the stocks' current prices.
///
/// Returns `None` when the user does not exist.
pub async fn summarize(
    pool: &DbPool,
    user_id: i64,
) -> Result<Option<PortfolioSummary>, sqlx::Error> {
    let Some(user) = db::get_user(pool, user_id).await? else {
        return Ok(None);
    };
    let holdings = db::list_active_holdings(pool, user_id).await?;
    Ok(Some(value(holdings, user.cash_balance, Utc::now())))
}

pub fn value(
    holdings: Vec<HoldingDetail>,
    cash_balance: f64,
    as_of: DateTime<Utc>,
) -> PortfolioSummary {
    let holdings: Vec<PortfolioHolding> = holdings
        .into_iter()
        .filter(|h| h.quantity > 0)
        .map(|h| PortfolioHolding {
            holding_id: h.id,
            stock_id: h.stock_id,
            market_value: h.quantity as f64 * h.current_price,
            symbol: h.symbol,
            company_name: h.company_name,
            quantity: h.quantity,
            average_cost: h.average_cost,
            current_price: h.current_price,
            price_updated_at: h.price_updated_at,
        })
        .collect();

    let stock_value: f64 = holdings.iter().map(|h| h.market_value).sum();

    PortfolioSummary {
        total_value: stock_value + cash_balance,
        cash_balance,
        stock_value,
        holdings,
        last_updated: as_of,
    }
}
