//! # Page Analyzer
//!
//! 双队列的网页分析任务服务：从审计队列取任务做性能 / 无障碍 / AI 审计并落库，
//! 从测试队列取任务跑浏览器检查并把结果写进缓存
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有外部连接，只暴露能力
//! - `JobQueue` / `EphemeralCache` / `ResultStore` - Redis / PostgreSQL 实现和进程内实现
//! - `JsExecutor` - 页面的唯一持有者，提供 eval() 能力
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，每个模块包装一个外部子系统
//! - `LighthouseRunner` - 性能审计
//! - `AxeScanner` - 无障碍检查
//! - `SuggestionGenerator` - AI 优化建议
//! - `TestSuiteEngine` - 八项浏览器检查 + 截图 + Playwright 代码生成
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个任务"的完整处理流程
//! - `AuditFlow` - 审计 → 存在性检查 → 保存
//! - `TestFlow` - 测试 → 写缓存
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/consumer` - 单队列消费循环
//! - `orchestrator/app` - 启动、两个消费者并发运行、关停

pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::JsExecutor;
pub use models::{AuditJob, Job, JobKind, TestJob, TestResult};
pub use orchestrator::{App, QueueConsumer};
pub use workflow::{AuditFlow, JobHandler, TestFlow};
