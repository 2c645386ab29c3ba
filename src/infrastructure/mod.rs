//! 基础设施层
//!
//! 持有稀缺资源（页面、连接、连接池），只暴露能力。

pub mod cache;
pub mod js_executor;
pub mod memory;
pub mod queue;
pub mod store;

pub use cache::{EphemeralCache, RedisCache};
pub use js_executor::JsExecutor;
pub use memory::{MemoryCache, MemoryQueue, MemoryStore};
pub use queue::{JobQueue, RedisJobQueue};
pub use store::{PgResultStore, ResultStore};
