//! Application configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use cache::TtlPolicy;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `DATABASE_URL`: PostgreSQL URL; the in-memory store is used when unset
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: `10`)
/// - `REDIS_URL`: Redis URL; the in-memory cache is used when unset
/// - `CACHE_KEY_PREFIX`: namespace for Redis keys (default: `"store:"`)
/// - `CATALOG_CACHE_TTL_SECS` / `ORDERS_CACHE_TTL_SECS`: base expiries (default: `300` / `60`)
/// - `CACHE_TTL_JITTER`: expiry jitter fraction (default: `0.10`)
/// - `MEDIA_ROOT`: where receipts are written (default: `"./media"`)
/// - `SHIPMENT_WEBHOOK_URL`: shipping partner endpoint; notifications stay
///   in memory when unset
/// - `SHIPMENT_TIMEOUT_SECS`: per-request timeout (default: `5`)
/// - `TASK_WORKERS`: deferred task workers (default: `4`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub redis_url: Option<String>,
    pub cache_key_prefix: String,
    pub catalog_cache_ttl: Duration,
    pub orders_cache_ttl: Duration,
    pub cache_ttl_jitter: f64,
    pub media_root: PathBuf,
    pub shipment_webhook_url: Option<String>,
    pub shipment_timeout: Duration,
    pub task_workers: usize,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. Unparsable values fall
    /// back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let text = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let secs = |key: &str, default: Duration| {
            text(key)
                .and_then(|v| v.parse::<u64>().ok())
                .map_or(default, Duration::from_secs)
        };

        Self {
            host: text("HOST").unwrap_or(defaults.host),
            port: text("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: text("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: text("DATABASE_URL"),
            database_max_connections: text("DATABASE_MAX_CONNECTIONS")
                .and_then(|v| v.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.database_max_connections),
            redis_url: text("REDIS_URL"),
            cache_key_prefix: text("CACHE_KEY_PREFIX").unwrap_or(defaults.cache_key_prefix),
            catalog_cache_ttl: secs("CATALOG_CACHE_TTL_SECS", defaults.catalog_cache_ttl),
            orders_cache_ttl: secs("ORDERS_CACHE_TTL_SECS", defaults.orders_cache_ttl),
            cache_ttl_jitter: text("CACHE_TTL_JITTER")
                .and_then(|v| v.parse::<f64>().ok())
                .filter(|j| (0.0..=1.0).contains(j))
                .unwrap_or(defaults.cache_ttl_jitter),
            media_root: text("MEDIA_ROOT").map_or(defaults.media_root, PathBuf::from),
            shipment_webhook_url: text("SHIPMENT_WEBHOOK_URL"),
            shipment_timeout: secs("SHIPMENT_TIMEOUT_SECS", defaults.shipment_timeout),
            task_workers: text("TASK_WORKERS")
                .and_then(|v| v.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.task_workers),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn catalog_ttl(&self) -> TtlPolicy {
        TtlPolicy::new(self.catalog_cache_ttl, self.cache_ttl_jitter)
    }

    pub fn orders_ttl(&self) -> TtlPolicy {
        TtlPolicy::new(self.orders_cache_ttl, self.cache_ttl_jitter)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            database_max_connections: 10,
            redis_url: None,
            cache_key_prefix: "store:".to_string(),
            catalog_cache_ttl: Duration::from_secs(300),
            orders_cache_ttl: Duration::from_secs(60),
            cache_ttl_jitter: TtlPolicy::DEFAULT_JITTER,
            media_root: PathBuf::from("./media"),
            shipment_webhook_url: None,
            shipment_timeout: Duration::from_secs(5),
            task_workers: 4,
        }
    }
}
