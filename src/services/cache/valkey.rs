use async_trait::async_trait;
use std::time::Duration;

use crate::services::cache::client::{CacheClient, CacheError, CacheResult, ttl_seconds};

/// Valkey/Redis-backend cache client.
#[derive(Clone)]
pub struct ValkeyClient {
    manager: redis::aio::ConnectionManager,
}

impl ValkeyClient {
    // Create a Valkey client from a URL like `redis://localhost:6379`
    pub async fn new(url: &str) -> Result<Self, CacheError> {
        let client =
            redis::Client::open(url).map_err(|e| CacheError::BackendConnection(e.to_string()))?;

        let manager = client
            .get_connection_manager()
            .await
            .map_err(|e| CacheError::BackendConnection(e.to_string()))?;

        Ok(Self { manager })
    }

    async fn query<T: redis::FromRedisValue>(&self, cmd: &redis::Cmd) -> CacheResult<T> {
        // ConnectionManager is a cheap handle; clone per command.
        let mut conn = self.manager.clone();

        cmd.query_async(&mut conn)
            .await
            .map_err(|e| CacheError::BackendCommand(e.to_string()))
    }
}

#[async_trait]
impl CacheClient for ValkeyClient {
    fn backend_name(&self) -> &'static str {
        "valkey"
    }

    async fn get_string(&self, key: &str) -> CacheResult<Option<String>> {
        self.query(redis::cmd("GET").arg(key)).await
    }

    async fn set_if_absent_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> CacheResult<bool> {
        // `SET key value NX EX <seconds>` replies `OK` when set, Nil when the key exists.
        let resp: Option<String> = self
            .query(
                redis::cmd("SET")
                    .arg(key)
                    .arg(value)
                    .arg("NX")
                    .arg("EX")
                    .arg(ttl_seconds(ttl)),
            )
            .await?;

        Ok(resp.is_some())
    }

    async fn del(&self, keys: &[String]) -> CacheResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }

        self.query(redis::cmd("DEL").arg(keys)).await
    }

    async fn set_add_with_min_ttl(
        &self,
        key: &str,
        member: &str,
        ttl: Duration,
    ) -> CacheResult<()> {
        let seconds = ttl_seconds(ttl);

        let mut pipe = redis::pipe();
        pipe.atomic()
            .cmd("SADD")
            .arg(key)
            .arg(member)
            .ignore()
            // NX: fresh set gets a TTL; GT: an existing one only ever grows.
            .cmd("EXPIRE")
            .arg(key)
            .arg(seconds)
            .arg("NX")
            .ignore()
            .cmd("EXPIRE")
            .arg(key)
            .arg(seconds)
            .arg("GT")
            .ignore();

        let mut conn = self.manager.clone();
        let _: () = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::BackendCommand(e.to_string()))?;

        Ok(())
    }

    async fn set_members(&self, key: &str) -> CacheResult<Vec<String>> {
        self.query(redis::cmd("SMEMBERS").arg(key)).await
    }

    async fn set_remove(&self, key: &str, member: &str) -> CacheResult<()> {
        let _: u64 = self.query(redis::cmd("SREM").arg(key).arg(member)).await?;
        Ok(())
    }
}
