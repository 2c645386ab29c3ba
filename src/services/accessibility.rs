//! 无障碍检查服务 - 业务能力层
//!
//! 在独立的无头浏览器里注入 axe-core 并运行，只返回精简后的结果

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{error, info};

use crate::browser::BrowserSession;
use crate::config::Config;
use crate::error::{BrowserError, CollaboratorError};
use crate::infrastructure::JsExecutor;
use crate::models::{AccessibilityReport, AccessibilityViolation};

/// 无障碍扫描能力
#[async_trait]
pub trait AccessibilityScanner: Send + Sync {
    async fn scan(&self, url: &str) -> Result<AccessibilityReport, CollaboratorError>;
}

/// 基于 axe-core 的扫描器
pub struct AxeScanner {
    chrome_bin: String,
    axe_script_url: String,
    page_load_timeout: Duration,
}

impl AxeScanner {
    pub fn new(config: &Config) -> Self {
        Self {
            chrome_bin: config.chrome_bin.clone(),
            axe_script_url: config.axe_script_url.clone(),
            page_load_timeout: Duration::from_secs(config.page_load_timeout_secs),
        }
    }

    async fn scan_in(
        &self,
        session: &BrowserSession,
        url: &str,
    ) -> Result<AccessibilityReport, CollaboratorError> {
        let page = session.blank_page().await?;
        match tokio::time::timeout(self.page_load_timeout, page.goto(url)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(BrowserError::navigation_failed(url, e).into()),
            Err(_) => {
                return Err(BrowserError::navigation_failed(
                    url,
                    format!("超过 {} 秒", self.page_load_timeout.as_secs()),
                )
                .into())
            }
        }

        let executor = JsExecutor::new(page);
        let summary: AxeSummary = executor.eval_as(axe_script(&self.axe_script_url)).await?;
        Ok(summary.into_report())
    }
}

#[async_trait]
impl AccessibilityScanner for AxeScanner {
    async fn scan(&self, url: &str) -> Result<AccessibilityReport, CollaboratorError> {
        info!("正在运行无障碍检查: {}", url);

        let session = BrowserSession::launch(&self.chrome_bin, self.page_load_timeout).await?;
        let result = self.scan_in(&session, url).await;
        session.close().await;

        match &result {
            Ok(report) => info!(
                "无障碍检查完成: {} ({} 项违规)",
                url, report.total_violations
            ),
            Err(e) => error!("无障碍检查失败: {}", e),
        }
        result
    }
}

/// 页面内执行：按需加载 axe-core，运行后只回传需要的字段
fn axe_script(axe_script_url: &str) -> String {
    format!(
        r#"
        (async () => {{
            if (!window.axe) {{
                await new Promise((resolve, reject) => {{
                    const script = document.createElement('script');
                    script.src = {src};
                    script.onload = resolve;
                    script.onerror = () => reject(new Error('axe-core load failed'));
                    document.head.appendChild(script);
                }});
            }}
            const results = await window.axe.run();
            return {{
                violations: results.violations.map(v => ({{
                    id: v.id,
                    impact: v.impact,
                    description: v.description,
                    help: v.help,
                    helpUrl: v.helpUrl,
                    nodes: (v.nodes || []).length
                }})),
                passes: results.passes.length,
                incomplete: results.incomplete.length
            }};
        }})()
        "#,
        src = serde_json::Value::String(axe_script_url.to_string())
    )
}

/// axe 脚本回传的精简结果
#[derive(Debug, Deserialize)]
struct AxeSummary {
    #[serde(default)]
    violations: Vec<AxeViolation>,
    #[serde(default)]
    passes: usize,
    #[serde(default)]
    incomplete: usize,
}

#[derive(Debug, Deserialize)]
struct AxeViolation {
    #[serde(default)]
    id: String,
    impact: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    help: String,
    #[serde(default, rename = "helpUrl")]
    help_url: String,
    #[serde(default)]
    nodes: usize,
}

impl AxeSummary {
    fn into_report(self) -> AccessibilityReport {
        let violations: Vec<AccessibilityViolation> = self
            .violations
            .into_iter()
            .map(|v| AccessibilityViolation {
                id: v.id,
                impact: v.impact,
                description: v.description,
                help: v.help,
                help_url: v.help_url,
                node_count: v.nodes,
            })
            .collect();

        AccessibilityReport {
            total_violations: violations.len(),
            violations,
            passes: self.passes,
            incomplete: self.incomplete,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_summary_into_report() {
        let summary: AxeSummary = serde_json::from_value(json!({
            "violations": [
                {
                    "id": "image-alt",
                    "impact": "critical",
                    "description": "Ensures <img> elements have alternate text",
                    "help": "Images must have alternate text",
                    "helpUrl": "https://dequeuniversity.com/rules/axe/4.10/image-alt",
                    "nodes": 3
                },
                { "id": "region", "impact": null, "nodes": 1 }
            ],
            "passes": 21,
            "incomplete": 2
        }))
        .unwrap();

        let report = summary.into_report();
        assert_eq!(report.total_violations, 2);
        assert_eq!(report.passes, 21);
        assert_eq!(report.incomplete, 2);
        assert_eq!(report.violations[0].node_count, 3);
        assert_eq!(report.violations[0].impact.as_deref(), Some("critical"));
        assert_eq!(report.violations[1].impact, None);
        assert_eq!(report.violations[1].description, "");
    }

    #[test]
    fn test_script_quotes_url() {
        let script = axe_script("https://cdn.example/axe.min.js");
        assert!(script.contains(r#"script.src = "https://cdn.example/axe.min.js";"#));
    }
}
