use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, Client, ErrorKind, aio::MultiplexedConnection};

use crate::{CacheClient, CacheError, Result};

/// Redis-backed cache shared by every API instance.
#[derive(Clone)]
pub struct RedisCache {
    conn: MultiplexedConnection,
    prefix: String,
}

impl RedisCache {
    /// Connects to `url` (e.g. `redis://localhost:6379`). Every key is
    /// stored under `prefix`.
    pub async fn connect(url: &str, prefix: impl Into<String>) -> Result<Self> {
        let client = Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self {
            conn,
            prefix: prefix.into(),
        })
    }

    fn prefixed_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

/// Redis expiries are whole seconds, and zero is rejected.
fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl CacheClient for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(self.prefixed_key(key)).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.conn.clone();
        let prefixed = self.prefixed_key(key);

        match ttl {
            Some(ttl) => {
                let _: () = conn.set_ex(&prefixed, value, ttl_secs(ttl)).await?;
            }
            None => {
                let _: () = conn.set(&prefixed, value).await?;
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.del(self.prefixed_key(key)).await?;
        Ok(())
    }

    async fn add(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<bool> {
        let mut conn = self.conn.clone();

        let mut cmd = redis::cmd("SET");
        cmd.arg(self.prefixed_key(key)).arg(value).arg("NX");
        if let Some(ttl) = ttl {
            cmd.arg("EX").arg(ttl_secs(ttl));
        }

        // Nil when the key already exists.
        let stored: Option<String> = cmd.query_async(&mut conn).await?;
        Ok(stored.is_some())
    }

    async fn incr(&self, key: &str) -> Result<i64> {
        let mut conn = self.conn.clone();
        conn.incr(self.prefixed_key(key), 1i64)
            .await
            .map_err(|e| {
                if e.kind() == ErrorKind::ResponseError
                    && e.detail().is_some_and(|d| d.contains("not an integer"))
                {
                    CacheError::NotAnInteger {
                        key: key.to_string(),
                    }
                } else {
                    CacheError::Redis(e)
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_is_at_least_one_second() {
        assert_eq!(ttl_secs(Duration::from_millis(200)), 1);
        assert_eq!(ttl_secs(Duration::from_secs(300)), 300);
    }
}
