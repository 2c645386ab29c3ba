use serde::{Deserialize, Serialize};

use crate::models::job::AuditJob;

/// Lighthouse 报告的 SEO 问题
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeoIssue {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub description: String,
    pub score: f64,
}

/// Lighthouse 报告的性能问题
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceIssue {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub description: String,
    /// 预计节省的毫秒数
    pub savings: f64,
}

/// axe-core 报告的无障碍违规
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessibilityViolation {
    pub id: String,
    pub impact: Option<String>,
    pub description: String,
    pub help: String,
    #[serde(rename = "helpUrl")]
    pub help_url: String,
    pub node_count: usize,
}

/// 性能审计结果，失败时为全空
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    /// 秒
    pub lcp: Option<f64>,
    /// 毫秒
    pub fid: Option<f64>,
    pub cls: Option<f64>,
    /// 秒
    pub fcp: Option<f64>,
    /// 毫秒
    pub ttfb: Option<f64>,
    pub performance_score: Option<f64>,
    pub seo_score: Option<f64>,
    pub accessibility_score: Option<f64>,
    pub best_practices_score: Option<f64>,
    pub seo_issues: Vec<SeoIssue>,
    pub performance_issues: Vec<PerformanceIssue>,
}

impl PerformanceReport {
    pub fn is_empty(&self) -> bool {
        *self == PerformanceReport::default()
    }
}

/// 无障碍扫描结果，失败时为 `{violations: [], passes: 0, incomplete: 0}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccessibilityReport {
    pub violations: Vec<AccessibilityViolation>,
    pub passes: usize,
    pub incomplete: usize,
    pub total_violations: usize,
}

/// 一个页面的完整审计记录
///
/// 每个任务构造一次，交给 ResultStore 之后不再修改。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub run_id: i64,
    pub url: String,
    pub status_code: i32,
    pub load_time_ms: i64,

    // Core Web Vitals
    pub lcp_score: Option<f64>,
    pub fid_score: Option<f64>,
    pub cls_score: Option<f64>,
    pub fcp_score: Option<f64>,
    pub ttfb_score: Option<f64>,

    // SEO
    pub title: String,
    pub meta_description: String,
    pub h1_tags: Vec<String>,
    pub canonical_url: String,
    pub has_robots_meta: bool,

    // Issues
    pub seo_issues: Vec<SeoIssue>,
    pub accessibility_issues: Vec<AccessibilityViolation>,
    pub performance_issues: Vec<PerformanceIssue>,
    pub ai_suggestions: String,
}

impl AuditRecord {
    /// 合并任务信封里的页面元数据和三个子系统的结果
    pub fn assemble(
        job: &AuditJob,
        performance: PerformanceReport,
        accessibility: AccessibilityReport,
        ai_suggestions: String,
    ) -> Self {
        Self {
            run_id: job.run_id,
            url: job.url.clone(),
            status_code: job.status_code,
            load_time_ms: job.load_time_ms,
            lcp_score: performance.lcp,
            fid_score: performance.fid,
            cls_score: performance.cls,
            fcp_score: performance.fcp,
            ttfb_score: performance.ttfb,
            title: job.title.clone(),
            meta_description: job.description.clone(),
            h1_tags: job.h1_tags.clone(),
            canonical_url: job.canonical_url.clone(),
            has_robots_meta: job.has_robots_meta,
            seo_issues: performance.seo_issues,
            accessibility_issues: accessibility.violations,
            performance_issues: performance.performance_issues,
            ai_suggestions,
        }
    }
}
