use async_trait::async_trait;
use redis::{aio::ConnectionManager, Client, Script};

use super::refresh_store::{RefreshStateStore, RotateOutcome};

const KEY_PREFIX: &str = "refresh_family:";

// Returns 1 when rotated, 0 when absent, 2 when another id is current
// (the family key is deleted before returning).
const ROTATE_SCRIPT: &str = r#"
local current = redis.call('GET', KEYS[1])
if not current then
    return 0
end
if current == ARGV[1] then
    redis.call('SET', KEYS[1], ARGV[2], 'EX', ARGV[3])
    return 1
end
redis.call('DEL', KEYS[1])
return 2
"#;

/// Refresh state shared between service replicas through Redis. Entries
/// expire together with the refresh tokens they track.
#[derive(Clone)]
pub struct RedisRefreshStore {
    _client: Client,
    manager: ConnectionManager,
    rotate_script: Script,
    ttl_seconds: i64,
}

impl RedisRefreshStore {
    pub async fn new(
        config: &crate::config::RedisConfig,
        ttl_seconds: i64,
    ) -> Result<Self, anyhow::Error> {
        tracing::info!("Connecting to Redis");
        let client = Client::open(config.url.clone())?;

        // Use ConnectionManager for automatic reconnection
        let manager = client.get_connection_manager().await.map_err(|e| {
            tracing::error!("Failed to get Redis connection manager: {}", e);
            anyhow::anyhow!("Failed to connect to Redis: {}", e)
        })?;

        tracing::info!("Successfully connected to Redis");

        Ok(Self {
            _client: client,
            manager,
            rotate_script: Script::new(ROTATE_SCRIPT),
            ttl_seconds,
        })
    }

    fn key(family_id: &str) -> String {
        format!("{}{}", KEY_PREFIX, family_id)
    }
}

#[async_trait]
impl RefreshStateStore for RedisRefreshStore {
    async fn get_current(&self, family_id: &str) -> Result<Option<String>, anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("GET")
            .arg(Self::key(family_id))
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read refresh family: {}", e))
    }

    async fn set_current(&self, family_id: &str, token_id: &str) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("SET")
            .arg(Self::key(family_id))
            .arg(token_id)
            .arg("EX")
            .arg(self.ttl_seconds)
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to store refresh family: {}", e))
    }

    async fn rotate(
        &self,
        family_id: &str,
        expected: &str,
        next: &str,
    ) -> Result<RotateOutcome, anyhow::Error> {
        let mut conn = self.manager.clone();
        let result: i64 = self
            .rotate_script
            .key(Self::key(family_id))
            .arg(expected)
            .arg(next)
            .arg(self.ttl_seconds)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to rotate refresh family: {}", e))?;

        match result {
            1 => Ok(RotateOutcome::Rotated),
            2 => Ok(RotateOutcome::Superseded),
            0 => Ok(RotateOutcome::Missing),
            other => Err(anyhow::anyhow!(
                "Unexpected rotate script result: {}",
                other
            )),
        }
    }

    async fn revoke(&self, family_id: &str) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("DEL")
            .arg(Self::key(family_id))
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to revoke refresh family: {}", e))
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Redis health check failed: {}", e))
    }
}
