//! 页面审计流程 - 流程层
//!
//! 流程顺序：
//! 1. Lighthouse 性能审计（失败 → 空报告）
//! 2. axe 无障碍检查（失败 → 空结果）
//! 3. AI 建议（失败 → 错误提示文本）
//! 4. run 存在性检查 → 保存审计记录

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::error::{AppError, AppResult};
use crate::infrastructure::ResultStore;
use crate::models::{AccessibilityReport, AuditJob, AuditRecord, Job, JobKind, PerformanceReport};
use crate::services::{build_digest, AccessibilityScanner, PerformanceAuditor, SuggestionSource};
use crate::workflow::handler::JobHandler;

/// 依次调用三个子系统，任何一个失败都只替换成默认值
pub struct AuditAggregator {
    performance: Arc<dyn PerformanceAuditor>,
    accessibility: Arc<dyn AccessibilityScanner>,
    suggestions: Arc<dyn SuggestionSource>,
}

impl AuditAggregator {
    pub fn new(
        performance: Arc<dyn PerformanceAuditor>,
        accessibility: Arc<dyn AccessibilityScanner>,
        suggestions: Arc<dyn SuggestionSource>,
    ) -> Self {
        Self {
            performance,
            accessibility,
            suggestions,
        }
    }

    /// 组装审计记录，永远不会失败
    pub async fn aggregate(&self, job: &AuditJob) -> AuditRecord {
        let performance = match self.performance.audit(&job.url).await {
            Ok(report) => report,
            Err(e) => {
                warn!("{} 性能审计失败，使用空结果: {}", job, e);
                PerformanceReport::default()
            }
        };

        let accessibility = match self.accessibility.scan(&job.url).await {
            Ok(report) => report,
            Err(e) => {
                warn!("{} 无障碍检查失败，使用空结果: {}", job, e);
                AccessibilityReport::default()
            }
        };

        let digest = build_digest(job, &performance, &accessibility);
        let ai_suggestions = match self.suggestions.suggest(&digest).await {
            Ok(text) => text,
            Err(e) => {
                error!("{} 生成 AI 建议失败: {}", job, e);
                format!("Error generating suggestions: {}", e)
            }
        };

        AuditRecord::assemble(job, performance, accessibility, ai_suggestions)
    }
}

/// 审计任务处理器
pub struct AuditFlow {
    aggregator: AuditAggregator,
    store: Arc<dyn ResultStore>,
}

impl AuditFlow {
    pub fn new(aggregator: AuditAggregator, store: Arc<dyn ResultStore>) -> Self {
        Self { aggregator, store }
    }

    pub async fn run(&self, job: &AuditJob) -> AppResult<()> {
        info!("{} 📋 开始审计", job);

        let record = self.aggregator.aggregate(job).await;

        // 所属 run 已被删除或从未创建时不写入
        if !self.store.exists(job.run_id).await? {
            warn!("{} ⚠️ run 不存在，跳过保存", job);
            return Ok(());
        }

        self.store.save(&record).await.map_err(|e| {
            error!("{} ❌ 保存审计记录失败: {}", job, e);
            AppError::from(e)
        })?;

        info!("{} ✅ 审计完成并已保存", job);
        Ok(())
    }
}

#[async_trait]
impl JobHandler for AuditFlow {
    fn kind(&self) -> JobKind {
        JobKind::Audit
    }

    async fn handle(&self, job: Job) -> AppResult<()> {
        match job {
            Job::Audit(job) => self.run(&job).await,
            Job::Test(_) => Err(AppError::UnexpectedJob {
                handler: "audit",
                queue: JobKind::Test.label(),
            }),
        }
    }
}
