//! 页面检查项
//!
//! 八项检查按固定顺序执行，每一项单独容错：探测出错只让这一项失败，
//! 不影响其余检查。页面数据通过 `PageProbe` 读取，检查逻辑本身不碰浏览器。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BrowserError;
use crate::models::TestDetail;

/// 最多允许 1/5 的链接是占位链接
const MAX_PLACEHOLDER_LINK_RATIO: (usize, usize) = (1, 5);

/// H1 数量的合法区间
const MAX_H1_TAGS: usize = 3;

/// 页面上的一个 `<input>`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormInput {
    /// 小写的 type 属性，缺省为 "text"
    pub input_type: String,
    pub id: Option<String>,
    pub aria_label: Option<String>,
}

/// 读取已加载页面的各项数据
#[async_trait]
pub trait PageProbe: Send + Sync {
    /// 页面是否有 `<body>`
    async fn has_body(&self) -> Result<bool, BrowserError>;
    async fn title(&self) -> Result<String, BrowserError>;
    /// `None` 表示没有 `<meta name="description">` 标签
    async fn meta_description(&self) -> Result<Option<String>, BrowserError>;
    async fn h1_count(&self) -> Result<usize, BrowserError>;
    /// 每张图片的 alt 属性
    async fn image_alts(&self) -> Result<Vec<Option<String>>, BrowserError>;
    async fn form_inputs(&self) -> Result<Vec<FormInput>, BrowserError>;
    /// 所有 `<label for=...>` 指向的 id
    async fn label_targets(&self) -> Result<Vec<String>, BrowserError>;
    /// 每个 `<a>` 的原始 href 属性
    async fn link_hrefs(&self) -> Result<Vec<Option<String>>, BrowserError>;
    /// 严重级别的控制台错误数，`None` 表示拿不到控制台日志
    async fn severe_console_errors(&self) -> Result<Option<usize>, BrowserError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    PageLoads,
    TitlePresent,
    MetaDescription,
    H1Tags,
    ImageAlts,
    FormLabels,
    ValidLinks,
    ConsoleErrors,
}

impl Check {
    /// 执行顺序
    pub const ALL: [Check; 8] = [
        Check::PageLoads,
        Check::TitlePresent,
        Check::MetaDescription,
        Check::H1Tags,
        Check::ImageAlts,
        Check::FormLabels,
        Check::ValidLinks,
        Check::ConsoleErrors,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Check::PageLoads => "Page Loads Successfully",
            Check::TitlePresent => "Page Has Title",
            Check::MetaDescription => "Meta Description Present",
            Check::H1Tags => "H1 Tags",
            Check::ImageAlts => "Images Have Alt Text",
            Check::FormLabels => "Form Inputs Have Labels",
            Check::ValidLinks => "Links Are Valid",
            Check::ConsoleErrors => "No Console Errors",
        }
    }

    /// 执行检查，探测错误会变成这一项的失败结果
    pub async fn run(self, probe: &dyn PageProbe) -> TestDetail {
        match self.evaluate(probe).await {
            Ok(detail) => detail,
            // 控制台日志取不到时不算失败
            Err(_) if self == Check::ConsoleErrors => {
                TestDetail::pass(self.name(), "Console logs not available")
            }
            Err(e) => TestDetail::fail(self.name(), format!("Test error: {}", e)),
        }
    }

    async fn evaluate(self, probe: &dyn PageProbe) -> Result<TestDetail, BrowserError> {
        let name = self.name();
        let detail = match self {
            Check::PageLoads => {
                if probe.has_body().await? {
                    TestDetail::pass(name, "Page loaded and body element found")
                } else {
                    TestDetail::fail(name, "Failed to find body element")
                }
            }
            Check::TitlePresent => {
                let title = probe.title().await?;
                if title.is_empty() {
                    TestDetail::fail(name, "No title found")
                } else {
                    TestDetail::pass(name, format!("Title: \"{}\"", title))
                }
            }
            Check::MetaDescription => match probe.meta_description().await? {
                None => TestDetail::fail(name, "Meta description tag not found"),
                Some(content) if content.is_empty() => {
                    TestDetail::fail(name, "No meta description")
                }
                Some(content) => TestDetail::pass(
                    name,
                    format!("Meta description: {} characters", content.chars().count()),
                ),
            },
            Check::H1Tags => h1_detail(probe.h1_count().await?),
            Check::ImageAlts => image_alt_detail(&probe.image_alts().await?),
            Check::FormLabels => {
                let inputs = probe.form_inputs().await?;
                let labels = if inputs.is_empty() {
                    Vec::new()
                } else {
                    probe.label_targets().await?
                };
                form_label_detail(&inputs, &labels)
            }
            Check::ValidLinks => link_detail(&probe.link_hrefs().await?),
            Check::ConsoleErrors => match probe.severe_console_errors().await? {
                None => TestDetail::pass(name, "Console logs not available"),
                Some(0) => TestDetail::pass(name, "No console errors"),
                Some(n) => TestDetail::fail(name, format!("{} console error(s) found", n)),
            },
        };
        Ok(detail)
    }
}

/// 依次执行全部检查
pub async fn run_all(probe: &dyn PageProbe) -> Vec<TestDetail> {
    let mut details = Vec::with_capacity(Check::ALL.len());
    for check in Check::ALL {
        details.push(check.run(probe).await);
    }
    details
}

fn h1_detail(count: usize) -> TestDetail {
    let name = Check::H1Tags.name();
    match count {
        0 => TestDetail::fail(name, "No H1 tags found"),
        n if n > MAX_H1_TAGS => TestDetail::fail(
            name,
            format!("Too many H1 tags ({}), should be 1-{}", n, MAX_H1_TAGS),
        ),
        n => TestDetail::pass(name, format!("{} H1 tag(s) found", n)),
    }
}

fn image_alt_detail(alts: &[Option<String>]) -> TestDetail {
    let name = Check::ImageAlts.name();
    if alts.is_empty() {
        return TestDetail::pass(name, "No images found on page");
    }
    let with_alt = alts.iter().filter(|alt| !is_blank(alt.as_deref())).count();
    if with_alt == alts.len() {
        TestDetail::pass(name, "All images have alt text")
    } else {
        TestDetail::fail(
            name,
            format!("{}/{} images have alt text", with_alt, alts.len()),
        )
    }
}

fn form_label_detail(inputs: &[FormInput], label_targets: &[String]) -> TestDetail {
    let name = Check::FormLabels.name();
    let visible: Vec<&FormInput> = inputs
        .iter()
        .filter(|input| !matches!(input.input_type.as_str(), "hidden" | "submit" | "button"))
        .collect();
    if visible.is_empty() {
        return TestDetail::pass(name, "No form inputs found");
    }

    let labeled = visible
        .iter()
        .filter(|input| {
            let by_label = input
                .id
                .as_deref()
                .filter(|id| !id.is_empty())
                .is_some_and(|id| label_targets.iter().any(|target| target == id));
            by_label || !is_blank(input.aria_label.as_deref())
        })
        .count();

    if labeled == visible.len() {
        TestDetail::pass(name, "All inputs have labels")
    } else {
        TestDetail::fail(
            name,
            format!("{}/{} inputs have labels", labeled, visible.len()),
        )
    }
}

fn link_detail(hrefs: &[Option<String>]) -> TestDetail {
    let name = Check::ValidLinks.name();
    let total = hrefs.len();
    if total == 0 {
        return TestDetail::pass(name, "No links found");
    }

    let invalid = hrefs
        .iter()
        .filter(|href| is_placeholder_href(href.as_deref()))
        .count();
    let (num, den) = MAX_PLACEHOLDER_LINK_RATIO;
    let passed = invalid * den <= total * num;
    TestDetail::outcome(
        name,
        passed,
        format!("{}/{} links have valid hrefs", total - invalid, total),
    )
}

/// 缺失、空、`#` 或 `javascript:void(...)` / `javascript:;` 之类什么也不做的链接
pub fn is_placeholder_href(href: Option<&str>) -> bool {
    let Some(href) = href.map(str::trim) else {
        return true;
    };
    let lower = href.to_ascii_lowercase();
    href.is_empty()
        || href == "#"
        || lower.starts_with("javascript:void")
        || lower == "javascript:;"
        || lower == "javascript:"
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TestStatus;
    use crate::models::TestResult;

    /// 可编程的假页面
    #[derive(Default)]
    struct FakeProbe {
        no_body: bool,
        title: String,
        meta: Option<String>,
        h1_count: usize,
        image_alts: Vec<Option<String>>,
        inputs: Vec<FormInput>,
        labels: Vec<String>,
        hrefs: Vec<Option<String>>,
        console_errors: Option<usize>,
        broken: Vec<Check>,
    }

    impl FakeProbe {
        fn healthy() -> Self {
            Self {
                title: "Example Domain".to_string(),
                meta: Some("An example page".to_string()),
                h1_count: 1,
                console_errors: Some(0),
                ..Default::default()
            }
        }

        fn fail_if(&self, check: Check) -> Result<(), BrowserError> {
            if self.broken.contains(&check) {
                Err(BrowserError::ScriptExecutionFailed("probe crashed".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl PageProbe for FakeProbe {
        async fn has_body(&self) -> Result<bool, BrowserError> {
            self.fail_if(Check::PageLoads)?;
            Ok(!self.no_body)
        }
        async fn title(&self) -> Result<String, BrowserError> {
            self.fail_if(Check::TitlePresent)?;
            Ok(self.title.clone())
        }
        async fn meta_description(&self) -> Result<Option<String>, BrowserError> {
            self.fail_if(Check::MetaDescription)?;
            Ok(self.meta.clone())
        }
        async fn h1_count(&self) -> Result<usize, BrowserError> {
            self.fail_if(Check::H1Tags)?;
            Ok(self.h1_count)
        }
        async fn image_alts(&self) -> Result<Vec<Option<String>>, BrowserError> {
            self.fail_if(Check::ImageAlts)?;
            Ok(self.image_alts.clone())
        }
        async fn form_inputs(&self) -> Result<Vec<FormInput>, BrowserError> {
            self.fail_if(Check::FormLabels)?;
            Ok(self.inputs.clone())
        }
        async fn label_targets(&self) -> Result<Vec<String>, BrowserError> {
            Ok(self.labels.clone())
        }
        async fn link_hrefs(&self) -> Result<Vec<Option<String>>, BrowserError> {
            self.fail_if(Check::ValidLinks)?;
            Ok(self.hrefs.clone())
        }
        async fn severe_console_errors(&self) -> Result<Option<usize>, BrowserError> {
            self.fail_if(Check::ConsoleErrors)?;
            Ok(self.console_errors)
        }
    }

    fn input(input_type: &str, id: Option<&str>, aria_label: Option<&str>) -> FormInput {
        FormInput {
            input_type: input_type.to_string(),
            id: id.map(str::to_string),
            aria_label: aria_label.map(str::to_string),
        }
    }

    fn links(valid: usize, invalid: usize) -> Vec<Option<String>> {
        let mut hrefs: Vec<Option<String>> = (0..valid)
            .map(|i| Some(format!("/page/{}", i)))
            .collect();
        hrefs.extend((0..invalid).map(|_| Some("#".to_string())));
        hrefs
    }

    #[tokio::test]
    async fn test_healthy_page_passes_every_check_in_order() {
        let details = run_all(&FakeProbe::healthy()).await;

        let names: Vec<&str> = details.iter().map(|d| d.name.as_str()).collect();
        let expected: Vec<&str> = Check::ALL.iter().map(|c| c.name()).collect();
        assert_eq!(names, expected);
        assert!(details.iter().all(|d| d.passed), "{:?}", details);
        assert_eq!(details[1].message, "Title: \"Example Domain\"");
        assert_eq!(details[2].message, "Meta description: 15 characters");
    }

    #[tokio::test]
    async fn test_vacuous_passes() {
        let details = run_all(&FakeProbe {
            console_errors: None,
            ..FakeProbe::healthy()
        })
        .await;

        assert_eq!(details[4].message, "No images found on page");
        assert_eq!(details[5].message, "No form inputs found");
        assert_eq!(details[6].message, "No links found");
        assert!(details[7].passed);
        assert_eq!(details[7].message, "Console logs not available");
    }

    #[test]
    fn test_h1_boundaries() {
        let zero = h1_detail(0);
        assert!(!zero.passed);
        assert_eq!(zero.message, "No H1 tags found");

        let three = h1_detail(3);
        assert!(three.passed);
        assert_eq!(three.message, "3 H1 tag(s) found");

        let four = h1_detail(4);
        assert!(!four.passed);
        assert_eq!(four.message, "Too many H1 tags (4), should be 1-3");
    }

    #[test]
    fn test_link_threshold_boundary() {
        let two_of_ten = link_detail(&links(8, 2));
        assert!(two_of_ten.passed);
        assert_eq!(two_of_ten.message, "8/10 links have valid hrefs");

        let three_of_ten = link_detail(&links(7, 3));
        assert!(!three_of_ten.passed);
        assert_eq!(three_of_ten.message, "7/10 links have valid hrefs");
    }

    #[test]
    fn test_placeholder_hrefs() {
        assert!(is_placeholder_href(None));
        assert!(is_placeholder_href(Some("")));
        assert!(is_placeholder_href(Some(" # ")));
        assert!(is_placeholder_href(Some("javascript:void(0)")));
        assert!(is_placeholder_href(Some("JavaScript:void(0);")));
        assert!(is_placeholder_href(Some("javascript:;")));
        assert!(!is_placeholder_href(Some("#section")));
        assert!(!is_placeholder_href(Some("/about")));
        assert!(!is_placeholder_href(Some("javascript:openMenu()")));
    }

    #[test]
    fn test_image_alt_fraction() {
        let detail = image_alt_detail(&[
            Some("logo".to_string()),
            Some(String::new()),
            None,
            Some("hero".to_string()),
        ]);
        assert!(!detail.passed);
        assert_eq!(detail.message, "2/4 images have alt text");
    }

    #[test]
    fn test_only_non_visible_inputs_pass_vacuously() {
        let inputs = vec![
            input("hidden", Some("csrf"), None),
            input("submit", None, None),
            input("button", None, None),
        ];
        let detail = form_label_detail(&inputs, &[]);
        assert!(detail.passed);
        assert_eq!(detail.message, "No form inputs found");
    }

    #[test]
    fn test_form_labels() {
        let inputs = vec![
            input("text", Some("email"), None),
            input("password", Some("pw"), None),
            input("search", None, Some("Search the site")),
            input("hidden", None, None),
            input("submit", None, None),
            input("button", None, None),
        ];

        let all = form_label_detail(&inputs, &["email".to_string(), "pw".to_string()]);
        assert!(all.passed);
        assert_eq!(all.message, "All inputs have labels");

        let partial = form_label_detail(&inputs, &["email".to_string()]);
        assert!(!partial.passed);
        assert_eq!(partial.message, "2/3 inputs have labels");
    }

    #[tokio::test]
    async fn test_probe_error_only_fails_its_own_check() {
        let probe = FakeProbe {
            broken: vec![Check::H1Tags],
            ..FakeProbe::healthy()
        };
        let details = run_all(&probe).await;

        assert_eq!(details.len(), 8);
        assert!(!details[3].passed);
        assert!(details[3].message.starts_with("Test error: "));
        assert_eq!(details.iter().filter(|d| !d.passed).count(), 1);
        assert_eq!(TestResult::from_details(details).status, TestStatus::Warning);
    }

    #[tokio::test]
    async fn test_console_probe_error_counts_as_pass() {
        let probe = FakeProbe {
            broken: vec![Check::ConsoleErrors],
            ..FakeProbe::healthy()
        };
        let details = run_all(&probe).await;
        assert!(details[7].passed);
        assert_eq!(details[7].message, "Console logs not available");
    }

    #[tokio::test]
    async fn test_console_errors_fail() {
        let probe = FakeProbe {
            console_errors: Some(2),
            ..FakeProbe::healthy()
        };
        let detail = Check::ConsoleErrors.run(&probe).await;
        assert!(!detail.passed);
        assert_eq!(detail.message, "2 console error(s) found");
    }
}
