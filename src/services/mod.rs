pub mod accessibility;
pub mod code_generator;
pub mod lighthouse;
pub mod page_checks;
pub mod suggestion;
pub mod test_suite;

pub use accessibility::{AccessibilityScanner, AxeScanner};
pub use code_generator::{CodeGenerator, PlaywrightCodeGenerator};
pub use lighthouse::{LighthouseRunner, PerformanceAuditor};
pub use page_checks::{Check, FormInput, PageProbe};
pub use suggestion::{build_digest, SuggestionGenerator, SuggestionSource};
pub use test_suite::{ChromeLauncher, LoadedPage, PageLauncher, TestSuiteEngine};
