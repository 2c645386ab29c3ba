//! 浏览器测试套件 - 业务能力层
//!
//! 状态流转：打开页面（Loaded）→ 逐项检查（Running）→ 汇总结论（Finished）；
//! 页面打不开时直接记录一条失败明细（Aborted），跳过全部检查。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chromiumoxide::cdp::browser_protocol::log::{
    EnableParams as LogEnableParams, EventEntryAdded, LogEntryLevel,
};
use chromiumoxide::cdp::js_protocol::runtime::{
    ConsoleApiCalledType, EventConsoleApiCalled, EventExceptionThrown,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::browser::BrowserSession;
use crate::config::Config;
use crate::error::{BrowserError, PageLoadError};
use crate::infrastructure::JsExecutor;
use crate::models::{TestDetail, TestResult};
use crate::services::code_generator::CodeGenerator;
use crate::services::page_checks::{self, FormInput, PageProbe};

/// 打开页面的能力
#[async_trait]
pub trait PageLauncher: Send + Sync {
    /// 导航到 url 并等待页面稳定
    async fn open(&self, url: &str) -> Result<Box<dyn LoadedPage>, PageLoadError>;
}

/// 一个已加载、可检查的页面
#[async_trait]
pub trait LoadedPage: PageProbe {
    fn probe(&self) -> &dyn PageProbe;
    /// 当前 DOM 序列化后的 HTML
    async fn content(&self) -> Result<String, BrowserError>;
    /// 整页 PNG 截图
    async fn screenshot_png(&self) -> Result<Vec<u8>, BrowserError>;
    /// 释放浏览器，重复调用无副作用
    async fn close(&mut self);
}

/// 测试套件引擎
pub struct TestSuiteEngine {
    launcher: Arc<dyn PageLauncher>,
    code_generator: Arc<dyn CodeGenerator>,
}

impl TestSuiteEngine {
    pub fn new(launcher: Arc<dyn PageLauncher>, code_generator: Arc<dyn CodeGenerator>) -> Self {
        Self {
            launcher,
            code_generator,
        }
    }

    /// 对一个 URL 执行整套测试，总会得到一个结果
    pub async fn run(&self, url: &str) -> TestResult {
        info!("正在运行自动化测试: {}", url);
        let started = Instant::now();

        let mut result = match self.launcher.open(url).await {
            Ok(mut page) => {
                let result = self.exercise(page.as_ref(), url).await;
                page.close().await;
                result
            }
            Err(PageLoadError::Timeout(secs)) => {
                warn!("页面加载超时 ({} 秒): {}", secs, url);
                TestResult::from_details(vec![TestDetail::fail(
                    "Page Load",
                    PageLoadError::Timeout(secs).to_string(),
                )])
            }
            Err(PageLoadError::Failed(e)) => {
                error!("测试执行失败: {}", e);
                TestResult::from_details(vec![TestDetail::fail(
                    "Test Execution",
                    format!("Test execution error: {}", e),
                )])
            }
        };

        result.execution_time = round_secs(started.elapsed());
        info!(
            "测试完成 {}: {}/{} 通过 ({})",
            url,
            result.passed,
            result.total_tests,
            result.status.as_str()
        );
        result
    }

    async fn exercise(&self, page: &dyn LoadedPage, url: &str) -> TestResult {
        let markup = match page.content().await {
            Ok(markup) => markup,
            Err(e) => {
                warn!("无法获取页面 HTML: {}", e);
                String::new()
            }
        };

        let mut result = TestResult::from_details(page_checks::run_all(page.probe()).await);

        result.screenshot = match page.screenshot_png().await {
            Ok(png) => Some(format!("data:image/png;base64,{}", STANDARD.encode(png))),
            Err(e) => {
                warn!("截图失败: {}", e);
                None
            }
        };

        if !markup.is_empty() {
            match self.code_generator.generate(&markup, url) {
                Ok(code) => {
                    debug!("已生成 Playwright 代码: {}", url);
                    result.generated_code = Some(code);
                }
                Err(e) => error!("生成 Playwright 代码失败: {}", e),
            }
        }

        result
    }
}

fn round_secs(elapsed: Duration) -> f64 {
    (elapsed.as_secs_f64() * 100.0).round() / 100.0
}

// ========== Chrome 实现 ==========

/// 每个测试任务启动一个独立的无头浏览器
pub struct ChromeLauncher {
    chrome_bin: String,
    page_load_timeout: Duration,
    settle_delay: Duration,
}

impl ChromeLauncher {
    pub fn new(config: &Config) -> Self {
        Self {
            chrome_bin: config.chrome_bin.clone(),
            page_load_timeout: Duration::from_secs(config.page_load_timeout_secs),
            settle_delay: Duration::from_millis(config.settle_delay_ms),
        }
    }

    async fn navigate(&self, page: &Page, url: &str) -> Result<(), PageLoadError> {
        let secs = self.page_load_timeout.as_secs();
        match tokio::time::timeout(self.page_load_timeout, page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(CdpError::Timeout)) | Err(_) => Err(PageLoadError::Timeout(secs)),
            Ok(Err(e)) => Err(BrowserError::navigation_failed(url, e).into()),
        }
    }
}

#[async_trait]
impl PageLauncher for ChromeLauncher {
    async fn open(&self, url: &str) -> Result<Box<dyn LoadedPage>, PageLoadError> {
        let session = BrowserSession::launch(&self.chrome_bin, self.page_load_timeout).await?;
        let page = match session.blank_page().await {
            Ok(page) => page,
            Err(e) => {
                session.close().await;
                return Err(e.into());
            }
        };

        // 导航前挂上控制台监听
        let (console, listeners) = match ConsoleWatch::attach(&page).await {
            Ok((counter, listeners)) => (Some(counter), listeners),
            Err(e) => {
                debug!("控制台日志不可用: {}", e);
                (None, Vec::new())
            }
        };

        let mut chrome_page = ChromePage {
            session: Some(session),
            executor: JsExecutor::new(page),
            console,
            listeners,
        };

        if let Err(e) = self.navigate(chrome_page.executor.page(), url).await {
            chrome_page.close().await;
            return Err(e);
        }

        // 等页面稳定
        tokio::time::sleep(self.settle_delay).await;
        Ok(Box::new(chrome_page))
    }
}

/// 一条可能算作控制台错误的浏览器事件
#[derive(Debug, Clone)]
enum ConsoleSignal {
    /// `console.*` 调用
    Api(ConsoleApiCalledType),
    /// 浏览器日志（网络错误、安全告警等）
    Log(LogEntryLevel),
    /// 页面脚本里未捕获的异常
    Exception,
}

impl ConsoleSignal {
    fn is_severe(&self) -> bool {
        match self {
            ConsoleSignal::Api(kind) => *kind == ConsoleApiCalledType::Error,
            ConsoleSignal::Log(level) => *level == LogEntryLevel::Error,
            ConsoleSignal::Exception => true,
        }
    }
}

/// 后台消费一个事件流，严重级别的事件计入 `counter`
fn count_severe<S, E>(
    mut events: S,
    counter: Arc<AtomicUsize>,
    classify: fn(&E) -> ConsoleSignal,
) -> JoinHandle<()>
where
    S: futures::Stream<Item = Arc<E>> + Unpin + Send + 'static,
    E: Send + Sync + 'static,
{
    tokio::spawn(async move {
        while let Some(event) = events.next().await {
            if classify(event.as_ref()).is_severe() {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }
    })
}

/// 统计 error 级别的控制台输出、浏览器日志和未捕获异常
struct ConsoleWatch;

impl ConsoleWatch {
    async fn attach(page: &Page) -> Result<(Arc<AtomicUsize>, Vec<JoinHandle<()>>), CdpError> {
        let counter = Arc::new(AtomicUsize::new(0));

        let console_events = page.event_listener::<EventConsoleApiCalled>().await?;
        let exceptions = page.event_listener::<EventExceptionThrown>().await?;
        page.execute(LogEnableParams::default()).await?;
        let log_entries = page.event_listener::<EventEntryAdded>().await?;

        let listeners = vec![
            count_severe(console_events, counter.clone(), |event: &EventConsoleApiCalled| {
                ConsoleSignal::Api(event.r#type.clone())
            }),
            count_severe(exceptions, counter.clone(), |_: &EventExceptionThrown| {
                ConsoleSignal::Exception
            }),
            count_severe(log_entries, counter.clone(), |event: &EventEntryAdded| {
                ConsoleSignal::Log(event.entry.level.clone())
            }),
        ];

        Ok((counter, listeners))
    }
}

pub struct ChromePage {
    session: Option<BrowserSession>,
    executor: JsExecutor,
    console: Option<Arc<AtomicUsize>>,
    listeners: Vec<JoinHandle<()>>,
}

impl ChromePage {
    async fn read<T: DeserializeOwned>(&self, expr: &str) -> Result<T, BrowserError> {
        self.executor.read(expr).await
    }
}

#[async_trait]
impl PageProbe for ChromePage {
    async fn has_body(&self) -> Result<bool, BrowserError> {
        self.read("document.body !== null").await
    }

    async fn title(&self) -> Result<String, BrowserError> {
        self.read("document.title || ''").await
    }

    async fn meta_description(&self) -> Result<Option<String>, BrowserError> {
        self.read(
            r#"(() => {
                const meta = document.querySelector('meta[name="description"]');
                return meta ? (meta.getAttribute('content') || '') : null;
            })()"#,
        )
        .await
    }

    async fn h1_count(&self) -> Result<usize, BrowserError> {
        self.read("document.getElementsByTagName('h1').length").await
    }

    async fn image_alts(&self) -> Result<Vec<Option<String>>, BrowserError> {
        self.read("Array.from(document.images).map(img => img.getAttribute('alt'))")
            .await
    }

    async fn form_inputs(&self) -> Result<Vec<FormInput>, BrowserError> {
        self.read(
            r#"Array.from(document.getElementsByTagName('input')).map(input => ({
                input_type: (input.type || 'text').toLowerCase(),
                id: input.getAttribute('id'),
                aria_label: input.getAttribute('aria-label')
            }))"#,
        )
        .await
    }

    async fn label_targets(&self) -> Result<Vec<String>, BrowserError> {
        self.read("Array.from(document.querySelectorAll('label[for]')).map(label => label.getAttribute('for'))")
            .await
    }

    async fn link_hrefs(&self) -> Result<Vec<Option<String>>, BrowserError> {
        self.read("Array.from(document.getElementsByTagName('a')).map(a => a.getAttribute('href'))")
            .await
    }

    async fn severe_console_errors(&self) -> Result<Option<usize>, BrowserError> {
        Ok(self
            .console
            .as_ref()
            .map(|counter| counter.load(Ordering::SeqCst)))
    }
}

#[async_trait]
impl LoadedPage for ChromePage {
    fn probe(&self) -> &dyn PageProbe {
        self
    }

    async fn content(&self) -> Result<String, BrowserError> {
        self.executor.html().await
    }

    async fn screenshot_png(&self) -> Result<Vec<u8>, BrowserError> {
        self.executor.full_page_png().await
    }

    async fn close(&mut self) {
        for listener in self.listeners.drain(..) {
            listener.abort();
        }
        if let Some(session) = self.session.take() {
            session.close().await;
        }
    }
}
