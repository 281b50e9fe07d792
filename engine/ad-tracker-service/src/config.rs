//! Service configuration management

use anyhow::{Context, Result};

use click_pipeline::DEFAULT_WORKER_COUNT;

const DEFAULT_PORT: u16 = 8080;

/// Connection settings for the in-memory store.
#[derive(Debug, Clone)]
pub struct RedisSettings {
    pub addr: String,
    pub password: Option<String>,
    pub db: i64,
}

impl RedisSettings {
    /// Connection URL in the form the redis client accepts.
    pub fn url(&self) -> String {
        match &self.password {
            Some(password) => format!("redis://:{}@{}/{}", password, self.addr, self.db),
            None => format!("redis://{}/{}", self.addr, self.db),
        }
    }
}

/// Main service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// HTTP listen port
    pub port: u16,

    /// Postgres connection string
    pub database_url: String,

    /// In-memory store connection settings
    pub redis: RedisSettings,

    /// Number of queue workers
    pub worker_count: usize,
}

impl ServiceConfig {
    /// Load and validate configuration from environment variables.
    ///
    /// `DATABASE_URL`, `REDIS_ADDR` and `REDIS_DB` are required; a missing
    /// or invalid value is a startup failure. `WORKER_COUNT` is forgiving
    /// and falls back to the default on any parse failure.
    pub fn from_env() -> Result<Self> {
        let port = parse_port(std::env::var("PORT").ok())?;

        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is required")?;

        let addr = std::env::var("REDIS_ADDR").context("REDIS_ADDR is required")?;
        let password = std::env::var("REDIS_PASSWORD").ok().filter(|p| !p.is_empty());
        let db = std::env::var("REDIS_DB")
            .context("REDIS_DB is required")?
            .parse::<i64>()
            .context("Invalid REDIS_DB value")?;

        let worker_count = parse_worker_count(std::env::var("WORKER_COUNT").ok());

        Ok(Self {
            port,
            database_url,
            redis: RedisSettings { addr, password, db },
            worker_count,
        })
    }
}

fn parse_port(raw: Option<String>) -> Result<u16> {
    match raw.filter(|p| !p.is_empty()) {
        Some(port) => port.parse::<u16>().context("Invalid PORT value"),
        None => Ok(DEFAULT_PORT),
    }
}

/// `WORKER_COUNT` defaults rather than fails: the pipeline should come up
/// even when the deployment misconfigures it.
fn parse_worker_count(raw: Option<String>) -> usize {
    match raw.and_then(|count| count.parse::<usize>().ok()) {
        Some(count) => count,
        None => {
            tracing::warn!("Invalid WORKER_COUNT. Defaulting to {}", DEFAULT_WORKER_COUNT);
            DEFAULT_WORKER_COUNT
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redis_url_includes_password_only_when_present() {
        let without = RedisSettings { addr: "localhost:6379".to_string(), password: None, db: 0 };
        assert_eq!(without.url(), "redis://localhost:6379/0");

        let with = RedisSettings {
            addr: "localhost:6379".to_string(),
            password: Some("hunter2".to_string()),
            db: 3,
        };
        assert_eq!(with.url(), "redis://:hunter2@localhost:6379/3");
    }

    #[test]
    fn worker_count_falls_back_to_default_on_parse_failure() {
        assert_eq!(parse_worker_count(None), DEFAULT_WORKER_COUNT);
        assert_eq!(parse_worker_count(Some("".to_string())), DEFAULT_WORKER_COUNT);
        assert_eq!(parse_worker_count(Some("many".to_string())), DEFAULT_WORKER_COUNT);
        assert_eq!(parse_worker_count(Some("-1".to_string())), DEFAULT_WORKER_COUNT);
        assert_eq!(parse_worker_count(Some("8".to_string())), 8);
    }

    #[test]
    fn port_defaults_when_absent_and_rejects_garbage() {
        assert_eq!(parse_port(None).unwrap(), DEFAULT_PORT);
        assert_eq!(parse_port(Some("".to_string())).unwrap(), DEFAULT_PORT);
        assert_eq!(parse_port(Some("9090".to_string())).unwrap(), 9090);
        assert!(parse_port(Some("not-a-port".to_string())).is_err());
    }
}
