use async_trait::async_trait;
use redis::AsyncCommands;

use super::KeyValueStore;
use crate::errors::CohortMatchError;
use crate::errors::Result;

/// Redis-backed store; every key is prefixed with the configured namespace
#[derive(Clone)]
pub struct RedisStore {
    client: redis::Client,
    namespace: String,
}

impl RedisStore {
    pub fn connect(url: &str, namespace: impl Into<String>) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| CohortMatchError::CacheError(format!("Redis open error: {e}")))?;

        Ok(Self {
            client,
            namespace: namespace.into(),
        })
    }

    fn key(&self, k: &str) -> String {
        format!("{}{}", self.namespace, k)
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(|e| CohortMatchError::CacheError(format!("Redis connect error: {e}")))
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    fn name(&self) -> &str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.connection().await?;
        let value: Option<Vec<u8>> = conn
            .get(self.key(key))
            .await
            .map_err(|e| CohortMatchError::CacheError(format!("Redis GET error: {e}")))?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl_secs: u64) -> Result<()> {
        let k = self.key(key);
        let mut conn = self.connection().await?;
        redis::pipe()
            .set(&k, value)
            .ignore()
            .expire(&k, ttl_secs.max(1) as i64)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| CohortMatchError::CacheError(format!("Redis SET/EXPIRE error: {e}")))?;
        Ok(())
    }
}
