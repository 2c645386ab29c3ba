use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::error::BrowserError;

static SESSION_SEQ: AtomicU64 = AtomicU64::new(0);

/// 一次任务独占的无头浏览器
///
/// 每个会话使用独立的 user-data-dir，两个消费者可以同时各开一个浏览器。
/// 调用 `close()` 释放；被提前 drop 时事件循环任务会被中止，
/// Browser 自身的 Drop 负责结束子进程。
pub struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
    profile_dir: PathBuf,
}

impl BrowserSession {
    /// 启动无头浏览器
    pub async fn launch(chrome_bin: &str, request_timeout: Duration) -> Result<Self, BrowserError> {
        info!("🚀 启动无头浏览器...");

        let profile_dir = std::env::temp_dir().join(format!(
            "page-analyzer-{}-{}",
            std::process::id(),
            SESSION_SEQ.fetch_add(1, Ordering::Relaxed)
        ));

        // 配置无头浏览器
        let config = BrowserConfig::builder()
            .new_headless_mode()
            .chrome_executable(Path::new(chrome_bin))
            .user_data_dir(&profile_dir)
            .window_size(1920, 1080)
            .request_timeout(request_timeout)
            .args(vec![
                "--no-sandbox",            // 容器内运行
                "--disable-dev-shm-usage", // 防止共享内存不足
                "--disable-gpu",
            ])
            .build()
            .map_err(|e| {
                error!("配置无头浏览器失败: {}", e);
                BrowserError::ConfigurationFailed(e)
            })?;

        // 启动浏览器
        let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
            error!("启动无头浏览器失败: {}", e);
            BrowserError::LaunchFailed(e.to_string())
        })?;
        debug!("无头浏览器启动成功");

        // 在后台处理浏览器事件
        let handler = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        // 添加短暂延迟以等待浏览器状态同步
        sleep(Duration::from_millis(300)).await;

        Ok(Self {
            browser,
            handler,
            profile_dir,
        })
    }

    /// 打开空白页面
    ///
    /// 先开空白页再导航，调用方可以在导航前挂上事件监听
    pub async fn blank_page(&self) -> Result<Page, BrowserError> {
        self.browser.new_page("about:blank").await.map_err(|e| {
            error!("创建页面失败: {}", e);
            BrowserError::LaunchFailed(format!("创建页面失败: {}", e))
        })
    }

    /// 关闭浏览器并清理 profile 目录
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            debug!("关闭浏览器失败: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            debug!("等待浏览器退出失败: {}", e);
        }
        self.handler.abort();
        if let Err(e) = tokio::fs::remove_dir_all(&self.profile_dir).await {
            debug!("清理 profile 目录失败 {}: {}", self.profile_dir.display(), e);
        }
        debug!("浏览器会话已关闭");
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        self.handler.abort();
    }
}
