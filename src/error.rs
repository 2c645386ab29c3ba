use thiserror::Error;

/// 应用程序错误类型
///
/// 只有持久化 / 缓存 / 队列错误会穿过处理器边界，
/// 外部子系统（Lighthouse、axe、AI、浏览器）的错误在流程层就被替换成默认值。
#[derive(Debug, Error)]
pub enum AppError {
    /// 队列错误
    #[error("队列错误: {0}")]
    Queue(#[from] QueueError),
    /// 结果存储错误
    #[error("存储错误: {0}")]
    Store(#[from] StoreError),
    /// 缓存错误
    #[error("缓存错误: {0}")]
    Cache(#[from] CacheError),
    /// 处理器收到了不属于它的任务
    #[error("处理器 {handler} 无法处理 {queue} 队列的任务")]
    UnexpectedJob {
        handler: &'static str,
        queue: &'static str,
    },
}

/// 队列后端错误
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Redis 错误: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("队列操作失败: {0}")]
    OperationFailed(String),
}

/// ResultStore 错误
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),
    #[error("写入被拒绝: {0}")]
    Rejected(String),
}

/// EphemeralCache 错误
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Redis 错误: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("序列化失败: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("缓存写入失败: {0}")]
    WriteFailed(String),
}

/// 任务信封解码错误
#[derive(Debug, Error)]
pub enum JobDecodeError {
    #[error("不是合法的 JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("任务信封必须是 JSON 对象")]
    NotAnObject,
    #[error("缺少 url 字段")]
    MissingUrl,
}

/// 浏览器相关错误
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("浏览器配置失败: {0}")]
    ConfigurationFailed(String),
    #[error("启动浏览器失败: {0}")]
    LaunchFailed(String),
    #[error("导航到 {url} 失败: {reason}")]
    NavigationFailed { url: String, reason: String },
    #[error("执行脚本失败: {0}")]
    ScriptExecutionFailed(String),
    #[error("截图失败: {0}")]
    ScreenshotFailed(String),
}

impl From<chromiumoxide::error::CdpError> for BrowserError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        BrowserError::ScriptExecutionFailed(err.to_string())
    }
}

impl From<serde_json::Error> for BrowserError {
    fn from(err: serde_json::Error) -> Self {
        BrowserError::ScriptExecutionFailed(format!("结果反序列化失败: {}", err))
    }
}

/// 打开测试页面失败，测试套件会据此进入中止状态
#[derive(Debug, Error)]
pub enum PageLoadError {
    #[error("Page load timeout after {0} seconds")]
    Timeout(u64),
    #[error(transparent)]
    Failed(#[from] BrowserError),
}

/// 外部协作方（子系统）错误
///
/// 这些错误永远不会让任务失败，只会让对应字段降级为默认值。
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("Lighthouse 执行失败: {0}")]
    Lighthouse(String),
    #[error("Lighthouse 超时 ({0} 秒)")]
    LighthouseTimeout(u64),
    #[error("无障碍扫描失败: {0}")]
    Accessibility(String),
    #[error("AI 建议生成失败: {0}")]
    Suggestion(String),
    #[error("代码生成失败: {0}")]
    CodeGeneration(String),
    #[error(transparent)]
    Browser(#[from] BrowserError),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path} 失败: {reason}")]
    FileReadFailed { path: String, reason: String },
    #[error("解析配置文件 {path} 失败: {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

// ========== 便捷构造函数 ==========

impl CollaboratorError {
    pub fn suggestion(source: impl std::fmt::Display) -> Self {
        CollaboratorError::Suggestion(source.to_string())
    }

    pub fn accessibility(source: impl std::fmt::Display) -> Self {
        CollaboratorError::Accessibility(source.to_string())
    }
}

impl BrowserError {
    pub fn navigation_failed(url: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        BrowserError::NavigationFailed {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
