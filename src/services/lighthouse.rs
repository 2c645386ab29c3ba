//! 性能审计服务 - 业务能力层
//!
//! 调用 Lighthouse CLI 并解析其 JSON 输出，不关心流程

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tokio::process::Command;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::error::CollaboratorError;
use crate::models::{PerformanceIssue, PerformanceReport, SeoIssue};

const SEO_AUDITS: [&str; 7] = [
    "document-title",
    "meta-description",
    "http-status-code",
    "link-text",
    "is-crawlable",
    "robots-txt",
    "canonical",
];

const PERFORMANCE_AUDITS: [&str; 6] = [
    "render-blocking-resources",
    "unused-css-rules",
    "unused-javascript",
    "modern-image-formats",
    "uses-text-compression",
    "uses-responsive-images",
];

/// 性能审计能力
#[async_trait]
pub trait PerformanceAuditor: Send + Sync {
    async fn audit(&self, url: &str) -> Result<PerformanceReport, CollaboratorError>;
}

/// Lighthouse CLI 包装
pub struct LighthouseRunner {
    lighthouse_bin: String,
    timeout: Duration,
}

impl LighthouseRunner {
    pub fn new(config: &Config) -> Self {
        Self {
            lighthouse_bin: config.lighthouse_bin.clone(),
            timeout: Duration::from_secs(config.lighthouse_timeout_secs),
        }
    }
}

#[async_trait]
impl PerformanceAuditor for LighthouseRunner {
    async fn audit(&self, url: &str) -> Result<PerformanceReport, CollaboratorError> {
        info!("正在运行 Lighthouse: {}", url);

        // kill_on_drop: 超时后 future 被丢弃，子进程随之被杀掉
        let child = Command::new(&self.lighthouse_bin)
            .arg(url)
            .arg("--output=json")
            .arg("--output-path=stdout")
            .arg("--chrome-flags=--headless --no-sandbox")
            .arg("--quiet")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                error!("无法启动 Lighthouse: {}", e);
                return Err(CollaboratorError::Lighthouse(e.to_string()));
            }
            Err(_) => {
                error!("Lighthouse 超时: {}", url);
                return Err(CollaboratorError::LighthouseTimeout(self.timeout.as_secs()));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!("Lighthouse 执行失败: {}", stderr.trim());
            return Err(CollaboratorError::Lighthouse(format!(
                "退出码 {:?}",
                output.status.code()
            )));
        }

        let data: JsonValue = serde_json::from_slice(&output.stdout)
            .map_err(|e| CollaboratorError::Lighthouse(format!("输出不是合法 JSON: {}", e)))?;

        let report = extract_metrics(&data);
        debug!(
            "Lighthouse 完成: {} 个 SEO 问题, {} 个性能问题",
            report.seo_issues.len(),
            report.performance_issues.len()
        );
        info!("Lighthouse 审计完成: {}", url);
        Ok(report)
    }
}

/// 从 Lighthouse 报告中提取关键指标
pub fn extract_metrics(data: &JsonValue) -> PerformanceReport {
    let audits = &data["audits"];
    let categories = &data["categories"];

    let numeric = |id: &str| audits[id]["numericValue"].as_f64();
    let category = |id: &str| categories[id]["score"].as_f64().map(|s| s * 100.0);

    PerformanceReport {
        // Core Web Vitals
        lcp: numeric("largest-contentful-paint").map(|ms| ms / 1000.0),
        fid: numeric("max-potential-fid"),
        cls: numeric("cumulative-layout-shift"),
        fcp: numeric("first-contentful-paint").map(|ms| ms / 1000.0),
        ttfb: numeric("server-response-time"),

        performance_score: category("performance"),
        seo_score: category("seo"),
        accessibility_score: category("accessibility"),
        best_practices_score: category("best-practices"),

        seo_issues: extract_seo_issues(audits),
        performance_issues: extract_performance_issues(audits),
    }
}

/// 分数 < 1 的审计项才算问题；没有分数（null / 缺失）视为通过
fn failing_audit<'a>(audits: &'a JsonValue, id: &str) -> Option<&'a JsonValue> {
    let audit = audits.get(id)?;
    let score = audit.get("score").and_then(JsonValue::as_f64).unwrap_or(1.0);
    (score < 1.0).then_some(audit)
}

fn text(audit: &JsonValue, key: &str) -> String {
    audit[key].as_str().unwrap_or_default().to_string()
}

fn extract_seo_issues(audits: &JsonValue) -> Vec<SeoIssue> {
    SEO_AUDITS
        .iter()
        .filter_map(|id| {
            failing_audit(audits, id).map(|audit| SeoIssue {
                kind: id.to_string(),
                title: text(audit, "title"),
                description: text(audit, "description"),
                score: audit["score"].as_f64().unwrap_or(0.0),
            })
        })
        .collect()
}

fn extract_performance_issues(audits: &JsonValue) -> Vec<PerformanceIssue> {
    PERFORMANCE_AUDITS
        .iter()
        .filter_map(|id| {
            failing_audit(audits, id).map(|audit| PerformanceIssue {
                kind: id.to_string(),
                title: text(audit, "title"),
                description: text(audit, "description"),
                savings: audit["details"]["overallSavingsMs"].as_f64().unwrap_or(0.0),
            })
        })
        .collect()
}
