pub mod audit;
pub mod job;
pub mod test_result;

pub use audit::{
    AccessibilityReport, AccessibilityViolation, AuditRecord, PerformanceIssue, PerformanceReport,
    SeoIssue,
};
pub use job::{AuditJob, Job, JobKind, TestJob};
pub use test_result::{TestDetail, TestResult, TestStatus};
