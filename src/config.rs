//! Environment configuration.

use std::str::FromStr;

use crate::orders::Paging;
use crate::{EcommerceError, Result};

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub port: u16,
    pub nats_url: Option<String>,
    pub orders_default_page_size: u32,
    pub orders_max_page_size: u32,
}

impl Config {
    /// Reads the process environment. Call `dotenvy::dotenv()` first to pick up `.env`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| EcommerceError::Config("DATABASE_URL must be set".into()))?;
        let config = Self {
            database_url,
            database_max_connections: parse(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
            port: parse(&lookup, "PORT", 8083)?,
            nats_url: lookup("NATS_URL").filter(|v| !v.trim().is_empty()),
            orders_default_page_size: parse(&lookup, "ORDERS_DEFAULT_PAGE_SIZE", 10)?,
            orders_max_page_size: parse(&lookup, "ORDERS_MAX_PAGE_SIZE", 100)?,
        };
        if config.orders_default_page_size == 0 || config.orders_default_page_size > config.orders_max_page_size {
            return Err(EcommerceError::Config(format!(
                "ORDERS_DEFAULT_PAGE_SIZE must be between 1 and ORDERS_MAX_PAGE_SIZE ({})",
                config.orders_max_page_size
            )));
        }
        Ok(config)
    }

    pub fn paging(&self) -> Paging {
        Paging { default_limit: self.orders_default_page_size, max_limit: self.orders_max_page_size }
    }
}

fn parse<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T> {
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => {
            raw.trim().parse().map_err(|_| EcommerceError::Config(format!("{key} has an invalid value '{raw}'")))
        }
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://localhost/orders")])).unwrap();
        assert_eq!(config.port, 8083);
        assert_eq!(config.database_max_connections, 10);
        assert!(config.nats_url.is_none());
        assert_eq!(config.paging(), Paging { default_limit: 10, max_limit: 100 });
    }

    #[test]
    fn test_overrides_and_errors() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://db/orders"),
            ("PORT", "9000"),
            ("NATS_URL", "nats://bus:4222"),
            ("ORDERS_MAX_PAGE_SIZE", "50"),
        ]))
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.nats_url.as_deref(), Some("nats://bus:4222"));
        assert_eq!(config.orders_max_page_size, 50);

        assert!(matches!(Config::from_lookup(lookup(&[])), Err(EcommerceError::Config(_))));
        let bad_port = Config::from_lookup(lookup(&[("DATABASE_URL", "x"), ("PORT", "eighty")]));
        assert!(matches!(bad_port, Err(EcommerceError::Config(msg)) if msg.contains("PORT")));
        let bad_paging = Config::from_lookup(lookup(&[("DATABASE_URL", "x"), ("ORDERS_DEFAULT_PAGE_SIZE", "500")]));
        assert!(bad_paging.is_err());
    }
}
