//! 编排层（Orchestration Layer）
//!
//! ## 模块划分
//!
//! ### `app` - 应用生命周期
//! - 启动时连接队列、缓存、数据库，任何一个失败都不开始消费
//! - 装配子系统和处理器，显式传入所有依赖
//! - 两个消费者并发运行，Ctrl-C 后优雅停止
//!
//! ### `consumer` - 单队列消费循环
//! - pop → 解码 → 交给处理器
//! - 无法解码的任务记录后丢弃，处理器失败后固定退避
//!
//! ## 层次关系
//!
//! ```text
//! app (两个 QueueConsumer)
//!     ↓
//! consumer (单个队列)
//!     ↓
//! workflow::AuditFlow / TestFlow (单个任务)
//!     ↓
//! services (能力层：lighthouse / axe / AI / 测试套件)
//!     ↓
//! infrastructure (基础设施：队列 / 缓存 / 存储 / JsExecutor)
//! ```

pub mod app;
pub mod consumer;

// 重新导出主要类型
pub use app::App;
pub use consumer::{enqueue, ConsumerStats, QueueConsumer, Step};
