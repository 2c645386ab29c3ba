use serde::{Deserialize, Serialize};

/// 测试结论
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Warning,
    Failed,
}

impl TestStatus {
    /// 结论汇总：没有失败为 passed；失败数达到总数一半及以上为 failed；其余为 warning
    pub fn from_counts(failed: usize, total: usize) -> Self {
        if failed == 0 {
            TestStatus::Passed
        } else if failed * 2 >= total {
            TestStatus::Failed
        } else {
            TestStatus::Warning
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TestStatus::Passed => "passed",
            TestStatus::Warning => "warning",
            TestStatus::Failed => "failed",
        }
    }
}

/// 单项检查的结果，运行期间只追加不修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestDetail {
    pub name: String,
    pub passed: bool,
    pub message: String,
}

impl TestDetail {
    pub fn pass(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            message: message.into(),
        }
    }

    pub fn fail(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            message: message.into(),
        }
    }

    pub fn outcome(name: impl Into<String>, passed: bool, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed,
            message: message.into(),
        }
    }
}

/// 一次浏览器测试的结果，写入缓存后进程内副本即被丢弃
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub status: TestStatus,
    pub total_tests: usize,
    pub passed: usize,
    pub failed: usize,
    pub test_details: Vec<TestDetail>,
    /// `data:image/png;base64,...`，截图失败时为空
    #[serde(rename = "screenshot_url")]
    pub screenshot: Option<String>,
    /// 秒，保留两位小数
    pub execution_time: f64,
    /// 生成的 Playwright 代码
    #[serde(rename = "python_code")]
    pub generated_code: Option<String>,
}

impl TestResult {
    /// 由检查明细汇总计数和结论
    pub fn from_details(test_details: Vec<TestDetail>) -> Self {
        let total_tests = test_details.len();
        let passed = test_details.iter().filter(|d| d.passed).count();
        let failed = total_tests - passed;
        Self {
            status: TestStatus::from_counts(failed, total_tests),
            total_tests,
            passed,
            failed,
            test_details,
            screenshot: None,
            execution_time: 0.0,
            generated_code: None,
        }
    }
}
