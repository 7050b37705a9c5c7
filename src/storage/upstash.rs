use async_trait::async_trait;
use redis::{aio::MultiplexedConnection, AsyncCommands, Client, Script};

use std::sync::Arc;

use crate::service::user::{User, UserPatch};

use super::{MergeStrategy, StorageError, UserStore};

/// Folds a JSON patch into the stored JSON document in one server-side step.
///
/// ARGV: patch, mode (`merge`, `keep_existing` or `update`), user id.
/// Returns 0 when `update` finds no document.
const MERGE_SCRIPT: &str = r#"
local current = redis.call('GET', KEYS[1])
local mode = ARGV[2]
local doc
if current then
    doc = cjson.decode(current)
elseif mode == 'update' then
    return 0
else
    doc = { userId = ARGV[3] }
end
for field, value in pairs(cjson.decode(ARGV[1])) do
    if mode ~= 'keep_existing' or doc[field] == nil or doc[field] == cjson.null then
        doc[field] = value
    end
end
redis.call('SET', KEYS[1], cjson.encode(doc))
return 1
"#;

/// User documents stored as JSON strings under `user:<id>` (Upstash Redis in production).
#[derive(Clone)]
pub struct RedisUserStore {
    inner: Arc<Client>,
    merge: Arc<Script>,
}

impl RedisUserStore {
    pub async fn new(url: &str) -> Result<Self, StorageError> {
        info!("Initializing RedisUserStore...");
        let redis = Arc::new(Client::open(url)?);

        let mut conn = redis.get_multiplexed_async_connection().await?;
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        if pong != "PONG" {
            return Err(StorageError::Redis("Redis connection test failed".to_string()));
        }
        info!("Redis connection test successful");

        Ok(Self {
            inner: redis,
            merge: Arc::new(Script::new(MERGE_SCRIPT)),
        })
    }

    async fn get_connection(&self) -> Result<MultiplexedConnection, StorageError> {
        let conn = self.inner.get_multiplexed_async_connection().await?;
        Ok(conn)
    }

    async fn run_merge(&self, user_id: &str, patch: &UserPatch, mode: &str) -> Result<bool, StorageError> {
        let mut conn = self.get_connection().await?;
        let patch = serde_json::to_string(patch)?;

        let written: i32 = self
            .merge
            .key(user_key(user_id))
            .arg(patch)
            .arg(mode)
            .arg(user_id)
            .invoke_async(&mut conn)
            .await?;

        Ok(written == 1)
    }
}

fn user_key(user_id: &str) -> String {
    format!("user:{}", user_id)
}

#[async_trait]
impl UserStore for RedisUserStore {
    async fn upsert(&self, user_id: &str, patch: &UserPatch, strategy: MergeStrategy) -> Result<(), StorageError> {
        self.run_merge(user_id, patch, strategy.as_str()).await?;
        Ok(())
    }

    async fn get(&self, user_id: &str) -> Result<Option<User>, StorageError> {
        let mut conn = self.get_connection().await?;
        let value: Option<String> = conn.get(user_key(user_id)).await?;

        match value {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| StorageError::Corrupted {
                    key: user_key(user_id),
                    reason: e.to_string(),
                }),
            None => Ok(None),
        }
    }

    async fn update(&self, user_id: &str, patch: &UserPatch) -> Result<(), StorageError> {
        if !self.run_merge(user_id, patch, "update").await? {
            return Err(StorageError::NotFound(user_id.to_string()));
        }
        Ok(())
    }
}
