//! AI 建议服务 - 业务能力层
//!
//! 把审计结果压缩成一份有优先级、有上限的文本摘要，交给 LLM 生成优化建议
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 兼容 OpenAI API 的服务（通过 `OPENAI_API_BASE` 指定端点）

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::CollaboratorError;
use crate::models::{AccessibilityReport, AuditJob, PerformanceReport};

/// 每一类问题最多放进摘要的条数
pub const DIGEST_ISSUE_CAP: usize = 5;

pub const DISABLED_MESSAGE: &str = "AI suggestions are disabled (no OpenAI API key configured)";

/// AI 建议能力
///
/// 输入是一份文本摘要，输出是自由格式（Markdown）的建议文本
#[async_trait]
pub trait SuggestionSource: Send + Sync {
    async fn suggest(&self, digest: &str) -> Result<String, CollaboratorError>;
}

/// 基于 OpenAI 兼容接口的建议生成器
///
/// 没有配置 API key 时不创建客户端，直接返回固定的禁用提示
pub struct SuggestionGenerator {
    client: Option<Client<OpenAIConfig>>,
    model_name: String,
    temperature: f32,
}

impl SuggestionGenerator {
    pub fn new(config: &Config) -> Self {
        let client = config.openai_api_key.as_deref().map(|api_key| {
            let mut openai_config = OpenAIConfig::new().with_api_key(api_key);
            if let Some(api_base) = &config.openai_api_base {
                openai_config = openai_config.with_api_base(api_base);
            }
            Client::with_config(openai_config)
        });

        if client.is_none() {
            warn!("⚠️  未配置 OpenAI API key，AI 建议已禁用");
        }

        Self {
            client,
            model_name: config.openai_model.clone(),
            temperature: config.openai_temperature,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }
}

#[async_trait]
impl SuggestionSource for SuggestionGenerator {
    async fn suggest(&self, digest: &str) -> Result<String, CollaboratorError> {
        let Some(client) = &self.client else {
            return Ok(DISABLED_MESSAGE.to_string());
        };

        debug!("调用 LLM API，模型: {}", self.model_name);
        debug!("摘要长度: {} 字符", digest.len());

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(build_prompt(digest))
            .build()
            .map_err(CollaboratorError::suggestion)?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(vec![ChatCompletionRequestMessage::User(user_msg)])
            .temperature(self.temperature)
            .build()
            .map_err(CollaboratorError::suggestion)?;

        let response = client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            CollaboratorError::suggestion(e)
        })?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| CollaboratorError::suggestion("LLM 返回内容为空"))?;

        info!("AI 建议生成完成 ({} 字符)", content.len());
        Ok(content.trim().to_string())
    }
}

/// 组装给 AI 的审计摘要
///
/// 页面信息 → 性能指标（报告非空时）→ SEO 问题 → 性能问题 → 无障碍问题，
/// 每类只列前 `DIGEST_ISSUE_CAP` 条，标题里给出总数
pub fn build_digest(
    job: &AuditJob,
    performance: &PerformanceReport,
    accessibility: &AccessibilityReport,
) -> String {
    let mut parts = vec![
        format!("URL: {}", job.url),
        "\n## Page Information".to_string(),
        format!("Title: {}", or_na(&job.title)),
        format!("Description: {}", or_na(&job.description)),
        format!("H1 Tags: {}", job.h1_tags.join(", ")),
    ];

    if !performance.is_empty() {
        parts.push("\n## Performance Metrics".to_string());
        parts.push(format!("LCP: {}s", metric(performance.lcp)));
        parts.push(format!("FID: {}ms", metric(performance.fid)));
        parts.push(format!("CLS: {}", metric(performance.cls)));
        parts.push(format!(
            "Performance Score: {}/100",
            metric(performance.performance_score)
        ));
        parts.push(format!("SEO Score: {}/100", metric(performance.seo_score)));

        if !performance.seo_issues.is_empty() {
            parts.push(format!(
                "\n## SEO Issues Found ({}):",
                performance.seo_issues.len()
            ));
            parts.extend(
                performance
                    .seo_issues
                    .iter()
                    .take(DIGEST_ISSUE_CAP)
                    .map(|issue| format!("- {}: {}", issue.title, issue.description)),
            );
        }

        if !performance.performance_issues.is_empty() {
            parts.push(format!(
                "\n## Performance Issues Found ({}):",
                performance.performance_issues.len()
            ));
            parts.extend(
                performance
                    .performance_issues
                    .iter()
                    .take(DIGEST_ISSUE_CAP)
                    .map(|issue| format!("- {}: {}", issue.title, issue.description)),
            );
        }
    }

    if !accessibility.violations.is_empty() {
        parts.push(format!(
            "\n## Accessibility Issues Found ({}):",
            accessibility.violations.len()
        ));
        parts.extend(
            accessibility
                .violations
                .iter()
                .take(DIGEST_ISSUE_CAP)
                .map(|v| {
                    format!(
                        "- {} (Impact: {})",
                        v.description,
                        v.impact.as_deref().unwrap_or("N/A")
                    )
                }),
        );
    }

    parts.join("\n")
}

/// 把摘要套进提示词模板
pub fn build_prompt(digest: &str) -> String {
    format!(
        r#"
You are an expert SEO and web performance consultant. Analyze the following website audit results and provide actionable, prioritized recommendations for improvement.

{digest}

Please provide:
1. **Priority Issues**: The top 3-5 most critical issues that should be fixed first
2. **Quick Wins**: Easy fixes that can be implemented immediately
3. **Technical Recommendations**: Specific code changes or configurations needed
4. **Long-term Strategy**: Broader improvements for sustained optimization

Format your response in Markdown with clear sections and bullet points. Be specific and provide code examples where applicable.
"#
    )
}

fn or_na(value: &str) -> &str {
    if value.is_empty() {
        "N/A"
    } else {
        value
    }
}

fn metric(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccessibilityViolation, PerformanceIssue, SeoIssue};

    fn job() -> AuditJob {
        AuditJob {
            url: "https://example.com".to_string(),
            run_id: 7,
            title: "Example".to_string(),
            description: String::new(),
            h1_tags: vec!["Welcome".to_string(), "News".to_string()],
            canonical_url: String::new(),
            has_robots_meta: false,
            status_code: 200,
            load_time_ms: 0,
        }
    }

    fn seo_issue(i: usize) -> SeoIssue {
        SeoIssue {
            kind: format!("audit-{}", i),
            title: format!("SEO issue {}", i),
            description: format!("details {}", i),
            score: 0.0,
        }
    }

    #[test]
    fn test_digest_caps_each_category_at_five() {
        let performance = PerformanceReport {
            seo_issues: (1..=8).map(seo_issue).collect(),
            ..Default::default()
        };
        let digest = build_digest(&job(), &performance, &AccessibilityReport::default());

        assert!(digest.contains("## SEO Issues Found (8):"));
        for i in 1..=5 {
            assert!(digest.contains(&format!("- SEO issue {}: details {}", i, i)));
        }
        for i in 6..=8 {
            assert!(!digest.contains(&format!("SEO issue {}:", i)));
        }
    }

    #[test]
    fn test_digest_page_information_defaults() {
        let digest = build_digest(
            &job(),
            &PerformanceReport::default(),
            &AccessibilityReport::default(),
        );

        assert!(digest.starts_with("URL: https://example.com\n"));
        assert!(digest.contains("Title: Example"));
        assert!(digest.contains("Description: N/A"));
        assert!(digest.contains("H1 Tags: Welcome, News"));
        // 空报告不输出性能段落
        assert!(!digest.contains("## Performance Metrics"));
    }

    #[test]
    fn test_digest_metrics_and_violations() {
        let performance = PerformanceReport {
            lcp: Some(2.5),
            performance_score: Some(87.0),
            performance_issues: vec![PerformanceIssue {
                kind: "unused-javascript".to_string(),
                title: "Reduce unused JavaScript".to_string(),
                description: "Remove dead code".to_string(),
                savings: 450.0,
            }],
            ..Default::default()
        };
        let accessibility = AccessibilityReport {
            violations: vec![AccessibilityViolation {
                id: "image-alt".to_string(),
                impact: Some("critical".to_string()),
                description: "Images must have alternate text".to_string(),
                help: String::new(),
                help_url: String::new(),
                node_count: 2,
            }],
            total_violations: 1,
            ..Default::default()
        };

        let digest = build_digest(&job(), &performance, &accessibility);
        assert!(digest.contains("LCP: 2.5s"));
        assert!(digest.contains("FID: N/Ams"));
        assert!(digest.contains("Performance Score: 87/100"));
        assert!(digest.contains("## Performance Issues Found (1):"));
        assert!(digest.contains("## Accessibility Issues Found (1):"));
        assert!(digest.contains("- Images must have alternate text (Impact: critical)"));
    }

    #[test]
    fn test_prompt_embeds_digest() {
        let prompt = build_prompt("URL: https://example.com");
        assert!(prompt.contains("URL: https://example.com"));
        assert!(prompt.contains("**Quick Wins**"));
    }

    #[tokio::test]
    async fn test_disabled_without_api_key() {
        let config = Config {
            openai_api_key: None,
            ..Config::default()
        };
        let generator = SuggestionGenerator::new(&config);
        assert!(!generator.is_enabled());

        let text = generator.suggest("URL: https://example.com").await.unwrap();
        assert_eq!(text, DISABLED_MESSAGE);
    }
}
