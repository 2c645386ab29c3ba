//! 浏览器测试流程 - 流程层
//!
//! 跑完测试套件后把结果写进缓存，供调用方轮询；没有存在性检查，也不落库

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info};

use crate::error::{AppError, AppResult, CacheError};
use crate::infrastructure::EphemeralCache;
use crate::models::{Job, JobKind, TestJob};
use crate::services::TestSuiteEngine;
use crate::workflow::handler::JobHandler;

/// 测试任务处理器
pub struct TestFlow {
    engine: TestSuiteEngine,
    cache: Arc<dyn EphemeralCache>,
    result_ttl: Duration,
}

impl TestFlow {
    pub fn new(engine: TestSuiteEngine, cache: Arc<dyn EphemeralCache>, result_ttl: Duration) -> Self {
        Self {
            engine,
            cache,
            result_ttl,
        }
    }

    pub async fn run(&self, job: &TestJob) -> AppResult<()> {
        info!("{} 🧪 开始测试", job);

        let result = self.engine.run(&job.url).await;
        let payload = serde_json::to_string(&result).map_err(CacheError::from)?;

        let key = job.cache_key();
        self.cache
            .set(&key, &payload, self.result_ttl)
            .await
            .map_err(|e| {
                error!("{} ❌ 写入测试结果失败: {}", job, e);
                AppError::from(e)
            })?;

        info!(
            "{} ✅ 测试结果已写入 {} ({}/{} 通过)",
            job, key, result.passed, result.total_tests
        );
        Ok(())
    }
}

#[async_trait]
impl JobHandler for TestFlow {
    fn kind(&self) -> JobKind {
        JobKind::Test
    }

    async fn handle(&self, job: Job) -> AppResult<()> {
        match job {
            Job::Test(job) => self.run(&job).await,
            Job::Audit(_) => Err(AppError::UnexpectedJob {
                handler: "test",
                queue: JobKind::Audit.label(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CollaboratorError, PageLoadError};
    use crate::infrastructure::MemoryCache;
    use crate::models::{TestResult, TestStatus};
    use crate::services::{CodeGenerator, LoadedPage, PageLauncher};
    use tokio_test::assert_ok;

    struct TimeoutLauncher;

    #[async_trait]
    impl PageLauncher for TimeoutLauncher {
        async fn open(&self, _url: &str) -> Result<Box<dyn LoadedPage>, PageLoadError> {
            Err(PageLoadError::Timeout(30))
        }
    }

    struct NoCode;

    impl CodeGenerator for NoCode {
        fn generate(&self, _markup: &str, _url: &str) -> Result<String, CollaboratorError> {
            Ok(String::new())
        }
    }

    fn flow(cache: Arc<MemoryCache>) -> TestFlow {
        TestFlow::new(
            TestSuiteEngine::new(Arc::new(TimeoutLauncher), Arc::new(NoCode)),
            cache,
            Duration::from_secs(3600),
        )
    }

    fn job() -> TestJob {
        TestJob {
            url: "https://example.com".to_string(),
            page_id: "abc".to_string(),
        }
    }

    #[tokio::test]
    async fn test_timed_out_page_is_still_cached() {
        let cache = Arc::new(MemoryCache::new());
        assert_ok!(flow(cache.clone()).run(&job()).await);

        let raw = cache.get("test_result:abc").await.unwrap().unwrap();
        let result: TestResult = serde_json::from_str(&raw).unwrap();
        assert_eq!(result.status, TestStatus::Failed);
        assert_eq!(result.total_tests, 1);
        assert_eq!(result.test_details.len(), 1);
        assert_eq!(result.test_details[0].name, "Page Load");

        let ttl = cache.ttl_of("test_result:abc").await.unwrap();
        assert!(ttl > Duration::from_secs(3590) && ttl <= Duration::from_secs(3600));
    }

    #[tokio::test]
    async fn test_cache_failure_propagates() {
        let cache = Arc::new(MemoryCache::new());
        cache.fail_writes(true);
        let result = flow(cache).run(&job()).await;
        assert!(matches!(result, Err(AppError::Cache(_))));
    }

    #[tokio::test]
    async fn test_wire_format_field_names() {
        let cache = Arc::new(MemoryCache::new());
        assert_ok!(flow(cache.clone()).run(&job()).await);

        let raw = cache.get("test_result:abc").await.unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["status"], "failed");
        assert!(value.get("screenshot_url").is_some());
        assert!(value.get("python_code").is_some());
        assert!(value["execution_time"].is_number());
    }
}
