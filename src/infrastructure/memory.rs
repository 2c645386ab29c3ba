//! 进程内实现（测试和本地开发用）
//!
//! - `MemoryQueue`：按队列名分组的 VecDeque，push 时用 Notify 唤醒阻塞的 pop
//! - `MemoryCache`：带过期时间的 HashMap
//! - `MemoryStore`：已知 run 集合 + 已保存记录

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use crate::error::{CacheError, QueueError, StoreError};
use crate::infrastructure::{EphemeralCache, JobQueue, ResultStore};
use crate::models::AuditRecord;

#[derive(Default)]
pub struct MemoryQueue {
    queues: Mutex<HashMap<String, VecDeque<String>>>,
    notify: Notify,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self, queue: &str) -> usize {
        self.queues
            .lock()
            .await
            .get(queue)
            .map(VecDeque::len)
            .unwrap_or(0)
    }

    async fn try_pop(&self, queue: &str) -> Option<String> {
        self.queues
            .lock()
            .await
            .get_mut(queue)
            .and_then(VecDeque::pop_front)
    }
}

#[async_trait]
impl JobQueue for MemoryQueue {
    async fn pop(&self, queue: &str, timeout: Duration) -> Result<Option<String>, QueueError> {
        let deadline = Instant::now() + timeout;
        loop {
            // 先注册再检查，避免错过检查与等待之间的 push
            let notified = self.notify.notified();
            if let Some(payload) = self.try_pop(queue).await {
                return Ok(Some(payload));
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            if tokio::time::timeout(remaining, notified).await.is_err() {
                return Ok(self.try_pop(queue).await);
            }
        }
    }

    async fn push(&self, queue: &str, payload: &str) -> Result<(), QueueError> {
        self.queues
            .lock()
            .await
            .entry(queue.to_string())
            .or_default()
            .push_back(payload.to_string());
        self.notify.notify_waiters();
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (String, Instant)>>,
    fail_writes: AtomicBool,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 之后的 set 全部失败
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub async fn ttl_of(&self, key: &str) -> Option<Duration> {
        self.entries
            .lock()
            .await
            .get(key)
            .map(|(_, expires)| expires.saturating_duration_since(Instant::now()))
    }
}

#[async_trait]
impl EphemeralCache for MemoryCache {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CacheError::WriteFailed(format!("写入 {} 被拒绝", key)));
        }
        self.entries
            .lock()
            .await
            .insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some((_, expires)) if *expires <= Instant::now() => {
                entries.remove(key);
                Ok(None)
            }
            Some((value, _)) => Ok(Some(value.clone())),
            None => Ok(None),
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    runs: Mutex<HashSet<i64>>,
    saved: Mutex<Vec<AuditRecord>>,
    save_calls: AtomicUsize,
    fail_saves: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_runs(run_ids: impl IntoIterator<Item = i64>) -> Self {
        let store = Self::default();
        store.runs.lock().await.extend(run_ids);
        store
    }

    pub async fn delete_run(&self, run_id: i64) {
        self.runs.lock().await.remove(&run_id);
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }

    pub async fn saved(&self) -> Vec<AuditRecord> {
        self.saved.lock().await.clone()
    }
}

#[async_trait]
impl ResultStore for MemoryStore {
    async fn exists(&self, run_id: i64) -> Result<bool, StoreError> {
        Ok(self.runs.lock().await.contains(&run_id))
    }

    async fn save(&self, record: &AuditRecord) -> Result<(), StoreError> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Rejected(format!("run {} 写入失败", record.run_id)));
        }
        self.saved.lock().await.push(record.clone());
        Ok(())
    }
}
