use async_trait::async_trait;

use crate::error::AppResult;
use crate::models::{Job, JobKind};

/// 单个任务的处理器
///
/// 只有持久化 / 缓存失败会以 `Err` 返回，子系统失败在处理器内部降级
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// 处理器对应的队列类型
    fn kind(&self) -> JobKind;

    async fn handle(&self, job: Job) -> AppResult<()>;
}
