// src/config.rs
use log::{warn, LevelFilter};
use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct Config {
    /// e.g. "sqlite://data/portfolio.db" or "sqlite::memory:"
    pub database_url: String,
    pub max_connections: u32,
    pub host: IpAddr,
    pub port: u16,
    pub log_level: LevelFilter,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite://data/portfolio.db".to_string(),
            max_connections: 5,
            host: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            port: 3030,
            log_level: LevelFilter::Info,
        }
    }
}

impl Config {
    /// Reads the environment, after loading `.env` if one is present.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        Self {
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            max_connections: parse_var("DATABASE_MAX_CONNECTIONS", defaults.max_connections),
            host: parse_var("HOST", defaults.host),
            port: parse_var("PORT", defaults.port),
            log_level: parse_var("LOG_LEVEL", defaults.log_level),
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse_var<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("Invalid value {:?} for {}, using default", raw, key);
            default
        }),
        Err(_) => default,
    }
}
