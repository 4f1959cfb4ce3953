// src/main.rs
mod api;
mod config;
mod db;
mod error;
mod handlers;
mod models;
mod orders;
mod portfolio;

use crate::config::Config;
use env_logger::Builder;
use log::{error, info};
use warp::Filter;

#[tokio::main]
async fn main() {
    let config = Config::from_env();
    Builder::new()
        .filter_level(config.log_level)
        .format_timestamp_secs()
        .init();

    // Initialize database connection
    let pool = match db::init(&config).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            return;
        }
    };
    info!("Connected to database...");

    info!("Starting the portfolio tracker application...");

    // Define routes
    let api = api::routes(pool).with(warp::log("portfolio_tracker::api"));

    // Start the server
    let addr = config.bind_addr();
    info!("Server running on http://{}", addr);
    warp::serve(api).run(addr).await;
}
