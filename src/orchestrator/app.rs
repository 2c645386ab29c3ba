//! 应用生命周期 - 编排层
//!
//! ## 职责
//!
//! 1. **启动**：写日志文件头、连接 Redis 和 PostgreSQL（任何一个失败都直接退出）
//! 2. **装配**：创建各子系统和两个处理器，所有依赖在构造时显式传入
//! 3. **运行**：两个消费者各占一个 tokio 任务，互不阻塞
//! 4. **关停**：Ctrl-C 后等两个消费者处理完手上的任务，再关闭连接池

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{error, info};

use crate::config::Config;
use crate::error::AppResult;
use crate::infrastructure::{JobQueue, PgResultStore, RedisCache, RedisJobQueue, ResultStore};
use crate::models::{Job, JobKind};
use crate::orchestrator::consumer::{self, ConsumerStats, QueueConsumer};
use crate::services::{
    AxeScanner, ChromeLauncher, LighthouseRunner, PlaywrightCodeGenerator, SuggestionGenerator,
    TestSuiteEngine,
};
use crate::utils::logging::{init_log_file, log_shutdown, log_startup};
use crate::workflow::{AuditAggregator, AuditFlow, TestFlow};

/// 应用主结构
pub struct App {
    config: Config,
    audit_consumer: QueueConsumer,
    test_consumer: QueueConsumer,
    producer: Arc<dyn JobQueue>,
    store: Arc<dyn ResultStore>,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        // 初始化日志文件
        init_log_file(&config.output_log_file)
            .with_context(|| format!("无法写入日志文件 {}", config.output_log_file))?;

        log_startup(&config);

        // BLPOP 会占住连接：两个消费者和生产者各用一条
        let redis_url = config.redis_connection_url();
        let audit_queue = RedisJobQueue::connect(&redis_url)
            .await
            .context("无法连接 Redis（审计队列）")?;
        let test_queue = RedisJobQueue::connect(&redis_url)
            .await
            .context("无法连接 Redis（测试队列）")?;
        let producer = RedisJobQueue::connect(&redis_url)
            .await
            .context("无法连接 Redis（生产者）")?;
        let cache = RedisCache::connect(&redis_url)
            .await
            .context("无法连接 Redis（结果缓存）")?;

        let store = PgResultStore::connect(&config.database_url(), config.db_max_connections)
            .await
            .context("无法连接 PostgreSQL")?;
        let store: Arc<dyn ResultStore> = Arc::new(store);

        let aggregator = AuditAggregator::new(
            Arc::new(LighthouseRunner::new(&config)),
            Arc::new(AxeScanner::new(&config)),
            Arc::new(SuggestionGenerator::new(&config)),
        );
        let audit_flow = AuditFlow::new(aggregator, store.clone());

        let engine = TestSuiteEngine::new(
            Arc::new(ChromeLauncher::new(&config)),
            Arc::new(PlaywrightCodeGenerator::new()),
        );
        let test_flow = TestFlow::new(
            engine,
            Arc::new(cache),
            Duration::from_secs(config.test_result_ttl_secs),
        );

        let audit_consumer = QueueConsumer::new(
            Arc::new(audit_queue),
            config.audit_queue.clone(),
            Arc::new(audit_flow),
            &config,
        );
        let test_consumer = QueueConsumer::new(
            Arc::new(test_queue),
            config.test_queue.clone(),
            Arc::new(test_flow),
            &config,
        );

        Ok(Self::from_parts(
            config,
            audit_consumer,
            test_consumer,
            Arc::new(producer),
            store,
        ))
    }

    /// 用已经装配好的组件创建应用
    pub fn from_parts(
        config: Config,
        audit_consumer: QueueConsumer,
        test_consumer: QueueConsumer,
        producer: Arc<dyn JobQueue>,
        store: Arc<dyn ResultStore>,
    ) -> Self {
        Self {
            config,
            audit_consumer,
            test_consumer,
            producer,
            store,
        }
    }

    /// 把任务推入它所属的队列
    pub async fn enqueue(&self, job: &Job) -> AppResult<()> {
        let queue_name = match job.kind() {
            JobKind::Audit => &self.config.audit_queue,
            JobKind::Test => &self.config.test_queue,
        };
        consumer::enqueue(self.producer.as_ref(), queue_name, job).await
    }

    /// 运行直到 Ctrl-C
    pub async fn run(self) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("收到 Ctrl-C，等待正在处理的任务完成...");
                    let _ = shutdown_tx.send(true);
                }
                Err(e) => error!("无法监听 Ctrl-C: {}", e),
            }
        });

        self.run_until(shutdown_rx).await?;
        Ok(())
    }

    /// 运行直到关停信号变为 `true`
    pub async fn run_until(
        self,
        shutdown: watch::Receiver<bool>,
    ) -> Result<(ConsumerStats, ConsumerStats)> {
        let Self {
            config,
            audit_consumer,
            test_consumer,
            store,
            ..
        } = self;

        // 两个队列各占一个任务，一个队列的慢任务不会拖住另一个
        let audit_handle = tokio::spawn(audit_consumer.run(shutdown.clone()));
        let test_handle = tokio::spawn(test_consumer.run(shutdown));

        let (audit_stats, test_stats) = tokio::join!(audit_handle, test_handle);
        let audit_stats = audit_stats.context("审计消费者异常退出")?;
        let test_stats = test_stats.context("测试消费者异常退出")?;

        store.close().await;

        info!(
            "📊 审计任务: 成功 {} / 失败 {}；测试任务: 成功 {} / 失败 {}",
            audit_stats.handled, audit_stats.failed, test_stats.handled, test_stats.failed
        );
        log_shutdown(&config.output_log_file);

        Ok((audit_stats, test_stats))
    }
}
