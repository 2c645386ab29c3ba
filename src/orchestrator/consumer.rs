//! 队列消费者 - 编排层
//!
//! 一个消费者只绑定一个队列，严格串行：一个任务处理完才会 pop 下一个。
//! 处理器失败（包括 panic）会在这里被拦下，记录日志后固定退避一段时间再继续。

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{AppResult, QueueError};
use crate::infrastructure::JobQueue;
use crate::models::Job;
use crate::utils::truncate_text;
use crate::workflow::JobHandler;

/// 一次 poll 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// 超时，队列为空
    Idle,
    /// 信封无法解码，已丢弃
    Malformed,
    /// 任务处理成功
    Handled,
    /// 处理器返回错误，已退避
    Failed,
    /// 队列本身出错，已退避
    QueueError,
}

/// 消费者统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConsumerStats {
    pub handled: usize,
    pub failed: usize,
    pub malformed: usize,
    pub queue_errors: usize,
}

impl ConsumerStats {
    fn record(&mut self, step: Step) {
        match step {
            Step::Idle => {}
            Step::Malformed => self.malformed += 1,
            Step::Handled => self.handled += 1,
            Step::Failed => self.failed += 1,
            Step::QueueError => self.queue_errors += 1,
        }
    }
}

pub struct QueueConsumer {
    queue: Arc<dyn JobQueue>,
    queue_name: String,
    handler: Arc<dyn JobHandler>,
    pop_timeout: Duration,
    backoff: Duration,
}

impl QueueConsumer {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        queue_name: impl Into<String>,
        handler: Arc<dyn JobHandler>,
        config: &Config,
    ) -> Self {
        Self {
            queue,
            queue_name: queue_name.into(),
            handler,
            pop_timeout: config.pop_timeout(),
            backoff: config.error_backoff(),
        }
    }

    /// pop 一次并处理
    pub async fn poll_once(&self) -> Step {
        let payload = match self.queue.pop(&self.queue_name, self.pop_timeout).await {
            Ok(Some(payload)) => payload,
            Ok(None) => return Step::Idle,
            Err(e) => {
                error!(queue = %self.queue_name, "❌ 读取队列失败: {}", e);
                sleep(self.backoff).await;
                return Step::QueueError;
            }
        };

        let job = match Job::decode(self.handler.kind(), &payload) {
            Ok(job) => job,
            Err(e) => {
                warn!(
                    queue = %self.queue_name,
                    "⚠️ 丢弃无法解码的任务 ({}): {}",
                    e,
                    truncate_text(&payload, 200)
                );
                return Step::Malformed;
            }
        };

        debug!(queue = %self.queue_name, url = job.url(), "收到任务");

        let outcome = AssertUnwindSafe(self.handler.handle(job))
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(())) => Step::Handled,
            Ok(Err(e)) => {
                error!(queue = %self.queue_name, "❌ 任务处理失败: {}", e);
                sleep(self.backoff).await;
                Step::Failed
            }
            Err(_) => {
                error!(queue = %self.queue_name, "❌ 任务处理器 panic");
                sleep(self.backoff).await;
                Step::Failed
            }
        }
    }

    /// 循环消费直到收到关停信号
    ///
    /// 信号只在两次 pop 之间检查，正在处理的任务会先完成
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> ConsumerStats {
        info!(queue = %self.queue_name, "👂 开始监听队列");
        let mut stats = ConsumerStats::default();

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }
            let step = self.poll_once().await;
            stats.record(step);
        }

        info!(
            queue = %self.queue_name,
            "🛑 消费者已停止: 成功 {} / 失败 {} / 丢弃 {} / 队列错误 {}",
            stats.handled,
            stats.failed,
            stats.malformed,
            stats.queue_errors
        );
        stats
    }
}

/// 生产者侧：编码并推入队列
pub async fn enqueue(queue: &dyn JobQueue, queue_name: &str, job: &Job) -> AppResult<()> {
    let payload = job
        .encode()
        .map_err(|e| QueueError::OperationFailed(format!("任务编码失败: {}", e)))?;
    queue.push(queue_name, &payload).await?;
    debug!(queue = %queue_name, url = job.url(), "任务已入队");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::MemoryQueue;
    use crate::models::{JobKind, TestJob};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    /// 记录收到的任务；`fail_first` 次之后才成功
    #[derive(Default)]
    struct RecordingHandler {
        seen: Mutex<Vec<Job>>,
        calls: AtomicUsize,
        fail_first: usize,
        panic_on_call: Option<usize>,
    }

    #[async_trait]
    impl JobHandler for RecordingHandler {
        fn kind(&self) -> JobKind {
            JobKind::Test
        }

        async fn handle(&self, job: Job) -> AppResult<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.panic_on_call == Some(call) {
                panic!("handler blew up");
            }
            self.seen.lock().await.push(job);
            if call < self.fail_first {
                return Err(QueueError::OperationFailed("store down".to_string()).into());
            }
            Ok(())
        }
    }

    fn config() -> Config {
        Config {
            pop_timeout_secs: 0,
            error_backoff_ms: 10,
            ..Config::default()
        }
    }

    fn consumer(queue: Arc<MemoryQueue>, handler: Arc<RecordingHandler>) -> QueueConsumer {
        QueueConsumer::new(queue, "test_queue", handler, &config())
    }

    #[tokio::test]
    async fn test_idle_on_empty_queue() {
        let consumer = consumer(Arc::new(MemoryQueue::new()), Arc::default());
        assert_eq!(consumer.poll_once().await, Step::Idle);
    }

    #[tokio::test]
    async fn test_malformed_payloads_are_skipped() {
        let queue = Arc::new(MemoryQueue::new());
        let handler = Arc::new(RecordingHandler::default());
        let consumer = consumer(queue.clone(), handler.clone());

        queue.push("test_queue", "not json").await.unwrap();
        queue.push("test_queue", "[1, 2]").await.unwrap();
        queue.push("test_queue", r#"{"page_id": "abc"}"#).await.unwrap();
        queue
            .push("test_queue", r#"{"url": "https://example.com", "page_id": "abc"}"#)
            .await
            .unwrap();

        for _ in 0..3 {
            assert_eq!(consumer.poll_once().await, Step::Malformed);
        }
        assert_eq!(consumer.poll_once().await, Step::Handled);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_handler_error_backs_off_and_continues() {
        let queue = Arc::new(MemoryQueue::new());
        let handler = Arc::new(RecordingHandler {
            fail_first: 1,
            ..Default::default()
        });
        let consumer = consumer(queue.clone(), handler.clone());

        for page_id in ["a", "b"] {
            let job = Job::Test(TestJob {
                url: "https://example.com".to_string(),
                page_id: page_id.to_string(),
            });
            enqueue(queue.as_ref(), "test_queue", &job).await.unwrap();
        }

        let started = tokio::time::Instant::now();
        assert_eq!(consumer.poll_once().await, Step::Failed);
        assert!(started.elapsed() >= Duration::from_millis(10));
        assert_eq!(consumer.poll_once().await, Step::Handled);

        // 失败的任务不会被重新入队
        assert_eq!(queue.len("test_queue").await, 0);
        assert_eq!(handler.seen.lock().await.len(), 2);
    }

    #[tokio::test]
    async fn test_handler_panic_is_contained() {
        let queue = Arc::new(MemoryQueue::new());
        let handler = Arc::new(RecordingHandler {
            panic_on_call: Some(0),
            ..Default::default()
        });
        let consumer = consumer(queue.clone(), handler.clone());

        for _ in 0..2 {
            queue
                .push("test_queue", r#"{"url": "https://example.com"}"#)
                .await
                .unwrap();
        }
        assert_eq!(consumer.poll_once().await, Step::Failed);
        assert_eq!(consumer.poll_once().await, Step::Handled);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown_signal() {
        let queue = Arc::new(MemoryQueue::new());
        let handler = Arc::new(RecordingHandler::default());
        // 空闲时阻塞在 pop 上，而不是空转
        let config = Config {
            pop_timeout_secs: 1,
            ..config()
        };
        let consumer = QueueConsumer::new(queue.clone(), "test_queue", handler.clone(), &config);
        let (tx, rx) = watch::channel(false);

        queue
            .push("test_queue", r#"{"url": "https://example.com", "page_id": 1}"#)
            .await
            .unwrap();

        let task = tokio::spawn(consumer.run(rx));
        while handler.calls.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        tx.send(true).unwrap();

        let stats = task.await.unwrap();
        assert_eq!(stats.handled, 1);
        assert_eq!(stats.failed, 0);
        assert_eq!(handler.seen.lock().await[0].url(), "https://example.com");
    }

    #[test]
    fn test_stats_record() {
        let mut stats = ConsumerStats::default();
        for step in [Step::Idle, Step::Handled, Step::Failed, Step::Malformed, Step::QueueError] {
            stats.record(step);
        }
        assert_eq!(
            stats,
            ConsumerStats {
                handled: 1,
                failed: 1,
                malformed: 1,
                queue_errors: 1,
            }
        );
    }
}
