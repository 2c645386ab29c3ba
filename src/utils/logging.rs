//! 日志工具模块
//!
//! 提供日志初始化、格式化和输出的辅助函数

use anyhow::Result;
use std::fs;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;

/// 初始化 tracing（尊重 `RUST_LOG`）
pub fn init() {
    let _ = tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,page_analyzer=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n页面分析服务日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 页面分析服务启动 - 双队列消费模式");
    info!("📥 审计队列: {}", config.audit_queue);
    info!("📥 测试队列: {}", config.test_queue);
    if config.ai_enabled() {
        info!("🤖 AI 建议: 已启用 (模型: {})", config.openai_model);
    } else {
        info!("🤖 AI 建议: 未配置 OPENAI_API_KEY，已禁用");
    }
    info!("{}", "=".repeat(60));
}

/// 记录程序停止信息
pub fn log_shutdown(log_file_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!(
        "🛑 服务已停止 - {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("日志文件: {}", log_file_path);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
