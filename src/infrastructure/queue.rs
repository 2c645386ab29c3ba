//! 任务队列 - 基础设施层
//!
//! Redis list 实现：生产者 `RPUSH`，消费者 `BLPOP`。
//! pop 成功即从队列移除，没有确认阶段。

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::{debug, info};

use crate::error::QueueError;

/// 命名的 FIFO 工作队列
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// 最多阻塞 `timeout`，超时返回 `None`（不是错误）
    async fn pop(&self, queue: &str, timeout: Duration) -> Result<Option<String>, QueueError>;

    async fn push(&self, queue: &str, payload: &str) -> Result<(), QueueError>;
}

/// Redis 队列
///
/// `BLPOP` 会占住连接，因此每个消费者必须持有自己的 `RedisJobQueue`。
pub struct RedisJobQueue {
    conn: MultiplexedConnection,
}

impl RedisJobQueue {
    /// 连接并 PING，失败即视为启动失败
    pub async fn connect(redis_url: &str) -> Result<Self, QueueError> {
        debug!("正在连接 Redis: {}", redis_url);
        let client = redis::Client::open(redis_url)?;
        let mut conn = client.get_multiplexed_async_connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        info!("✓ Redis 连接成功");
        Ok(Self { conn })
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn pop(&self, queue: &str, timeout: Duration) -> Result<Option<String>, QueueError> {
        let mut conn = self.conn.clone();
        // BLPOP 的 0 表示永久阻塞
        let secs = timeout.as_secs_f64().max(0.01);
        let popped: Option<(String, String)> = conn.blpop(queue, secs).await?;
        Ok(popped.map(|(_, payload)| payload))
    }

    async fn push(&self, queue: &str, payload: &str) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.rpush(queue, payload).await?;
        Ok(())
    }
}
