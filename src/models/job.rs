//! 任务信封
//!
//! 队列里的每条消息都是一个 UTF-8 JSON 对象。解码只在 pop 之后做一次，
//! 除 `url` 外的字段缺失时都会落到下面注明的默认值，不会让解码失败。

use std::fmt::Display;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;

use crate::error::JobDecodeError;

/// 任务来自哪个队列
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    Audit,
    Test,
}

impl JobKind {
    pub fn label(self) -> &'static str {
        match self {
            JobKind::Audit => "audit",
            JobKind::Test => "test",
        }
    }
}

/// 页面审计任务（来自爬虫）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditJob {
    pub url: String,
    /// 默认 0；0 不会是一个已存在的 run，因此会被存在性守卫跳过
    #[serde(default, deserialize_with = "lenient_i64")]
    pub run_id: i64,
    /// 默认 ""
    #[serde(default, deserialize_with = "null_default")]
    pub title: String,
    /// 默认 ""，兼容旧字段名 `meta_description`
    #[serde(default, alias = "meta_description", deserialize_with = "null_default")]
    pub description: String,
    /// 默认 []；页面没有 H1 时爬虫发送的是 null
    #[serde(default, deserialize_with = "null_default")]
    pub h1_tags: Vec<String>,
    /// 默认 ""
    #[serde(default, deserialize_with = "null_default")]
    pub canonical_url: String,
    /// 默认 false
    #[serde(default, deserialize_with = "null_default")]
    pub has_robots_meta: bool,
    /// 默认 200
    #[serde(default = "default_status_code", deserialize_with = "status_code_or_default")]
    pub status_code: i32,
    /// 默认 0
    #[serde(default, deserialize_with = "null_default")]
    pub load_time_ms: i64,
}

/// 浏览器测试任务
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestJob {
    pub url: String,
    /// 默认 ""；数字会被转成字符串
    #[serde(default, deserialize_with = "lenient_string")]
    pub page_id: String,
}

impl TestJob {
    /// 结果在缓存中的 key
    pub fn cache_key(&self) -> String {
        format!("test_result:{}", self.page_id)
    }
}

/// 解码后的任务
#[derive(Debug, Clone, PartialEq)]
pub enum Job {
    Audit(AuditJob),
    Test(TestJob),
}

impl Job {
    /// 按来源队列解码原始信封
    pub fn decode(kind: JobKind, payload: &str) -> Result<Job, JobDecodeError> {
        let value: JsonValue = serde_json::from_str(payload)?;
        let object = value.as_object().ok_or(JobDecodeError::NotAnObject)?;

        match object.get("url").and_then(|v| v.as_str()) {
            Some(url) if !url.trim().is_empty() => {}
            _ => return Err(JobDecodeError::MissingUrl),
        }

        let job = match kind {
            JobKind::Audit => Job::Audit(serde_json::from_value(value)?),
            JobKind::Test => Job::Test(serde_json::from_value(value)?),
        };
        Ok(job)
    }

    /// 生产者侧编码
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        match self {
            Job::Audit(job) => serde_json::to_string(job),
            Job::Test(job) => serde_json::to_string(job),
        }
    }

    pub fn kind(&self) -> JobKind {
        match self {
            Job::Audit(_) => JobKind::Audit,
            Job::Test(_) => JobKind::Test,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            Job::Audit(job) => &job.url,
            Job::Test(job) => &job.url,
        }
    }
}

impl Display for AuditJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[审计 run#{} {}]", self.run_id, self.url)
    }
}

impl Display for TestJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[测试 page#{} {}]", self.page_id, self.url)
    }
}

fn default_status_code() -> i32 {
    200
}

/// 显式的 null 和缺失字段一样取默认值
fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn status_code_or_default<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i32, D::Error> {
    Ok(Option::<i32>::deserialize(deserializer)?.unwrap_or_else(default_status_code))
}

/// 接受数字或数字字符串，其余情况取 0
fn lenient_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let value = JsonValue::deserialize(deserializer)?;
    Ok(match value {
        JsonValue::Number(n) => n.as_i64().unwrap_or_default(),
        JsonValue::String(s) => s.trim().parse().unwrap_or_default(),
        _ => 0,
    })
}

/// 接受字符串或数字，null 取空串
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = JsonValue::deserialize(deserializer)?;
    Ok(match value {
        JsonValue::String(s) => s,
        JsonValue::Null => String::new(),
        other => other.to_string(),
    })
}
