//! 临时缓存 - 基础设施层
//!
//! 测试结果只写入带过期时间的 key，由调用方轮询读取。

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use crate::error::CacheError;

/// 带 TTL 的 key-value 存储
#[async_trait]
pub trait EphemeralCache: Send + Sync {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
}

pub struct RedisCache {
    conn: MultiplexedConnection,
}

impl RedisCache {
    pub async fn connect(redis_url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl EphemeralCache for RedisCache {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        if ttl.as_secs() == 0 {
            return Err(CacheError::WriteFailed(format!("TTL 必须至少 1 秒: {}", key)));
        }
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(key, value, ttl.as_secs()).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }
}
