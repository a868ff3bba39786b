use std::collections::HashMap;

use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

use crate::config::Config;
use crate::error::EngineResult;

/// Thin Redis handle that namespaces every key with the configured prefix.
#[derive(Clone)]
pub struct Cache {
    conn: ConnectionManager,
    prefix: String,
}

impl Cache {
    pub async fn new(config: &Config) -> EngineResult<Self> {
        let client = Client::open(config.redis_url())?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self {
            conn,
            prefix: config.redis.key_prefix.clone(),
        })
    }

    pub fn key(&self, k: &str) -> String {
        format!("{}{}", self.prefix, k)
    }

    pub async fn hset(&self, key: &str, field: &str, value: &str) -> EngineResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.hset(self.key(key), field, value).await?;
        Ok(())
    }

    pub async fn hget(&self, key: &str, field: &str) -> EngineResult<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.hget(self.key(key), field).await?;
        Ok(value)
    }

    pub async fn hdel(&self, key: &str, field: &str) -> EngineResult<bool> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn.hdel(self.key(key), field).await?;
        Ok(removed > 0)
    }

    pub async fn hgetall(&self, key: &str) -> EngineResult<HashMap<String, String>> {
        let mut conn = self.conn.clone();
        let all: HashMap<String, String> = conn.hgetall(self.key(key)).await?;
        Ok(all)
    }

    pub async fn hlen(&self, key: &str) -> EngineResult<usize> {
        let mut conn = self.conn.clone();
        let len: usize = conn.hlen(self.key(key)).await?;
        Ok(len)
    }

    pub async fn del(&self, key: &str) -> EngineResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(self.key(key)).await?;
        Ok(())
    }

    pub async fn health_check(&self) -> bool {
        let mut conn = self.conn.clone();
        let pong: Result<String, _> = redis::cmd("PING").query_async(&mut conn).await;
        pong.is_ok()
    }
}
