//! 测试代码生成 - 业务能力层
//!
//! 从页面 HTML 生成 Python Playwright 的 Page Object 类和一个冒烟测试

use std::collections::HashSet;

use regex::Regex;
use tracing::debug;

use crate::error::CollaboratorError;

/// 每类定位器最多生成的条数
const MAX_LOCATORS: usize = 20;

/// 生成的类里已经占用的名字，定位器属性不能覆盖
const RESERVED_ATTRS: [&str; 3] = ["page", "goto", "URL"];

/// 代码生成能力
pub trait CodeGenerator: Send + Sync {
    fn generate(&self, markup: &str, url: &str) -> Result<String, CollaboratorError>;
}

/// Playwright（Python, sync API）Page Object 生成器
#[derive(Debug, Default, Clone)]
pub struct PlaywrightCodeGenerator;

impl PlaywrightCodeGenerator {
    pub fn new() -> Self {
        Self
    }
}

/// 一个生成出来的定位器属性
struct Locator {
    attr: String,
    expr: String,
    fillable: bool,
}

impl CodeGenerator for PlaywrightCodeGenerator {
    fn generate(&self, markup: &str, url: &str) -> Result<String, CollaboratorError> {
        let id_re = Regex::new(r#"<([a-zA-Z][a-zA-Z0-9]*)\b[^>]*?\sid\s*=\s*["']([^"']+)["']"#)
            .map_err(code_gen_error)?;
        let name_re =
            Regex::new(r#"<(?:input|textarea|select)\b[^>]*?\sname\s*=\s*["']([^"']+)["']"#)
                .map_err(code_gen_error)?;
        let button_re = Regex::new(r#"(?is)<button\b[^>]*>(.*?)</button>"#).map_err(code_gen_error)?;
        let link_re =
            Regex::new(r#"(?is)<a\b[^>]*\shref\s*=\s*["'][^"']*["'][^>]*>(.*?)</a>"#)
                .map_err(code_gen_error)?;
        let tag_re = Regex::new(r"<[^>]*>").map_err(code_gen_error)?;

        let mut used: HashSet<String> =
            RESERVED_ATTRS.iter().map(|name| name.to_string()).collect();
        let mut locators = Vec::new();

        // 带 id 的元素
        for caps in id_re.captures_iter(markup).take(MAX_LOCATORS) {
            let tag = caps[1].to_ascii_lowercase();
            let id = &caps[2];
            let attr = unique_attr(&mut used, &snake_case(id));
            locators.push(Locator {
                attr,
                expr: format!("page.locator(\"#{}\")", py_escape(id)),
                fillable: matches!(tag.as_str(), "input" | "textarea"),
            });
        }

        // 表单输入
        for caps in name_re.captures_iter(markup).take(MAX_LOCATORS) {
            let name = &caps[1];
            let attr = unique_attr(&mut used, &format!("{}_field", snake_case(name)));
            locators.push(Locator {
                attr,
                expr: format!("page.locator('[name=\"{}\"]')", py_escape(name)),
                fillable: true,
            });
        }

        // 按钮和链接按可见文本定位
        let text_of = |inner: &str| collapse_whitespace(&tag_re.replace_all(inner, " "));
        for (re, role) in [(&button_re, "button"), (&link_re, "link")] {
            let texts = re
                .captures_iter(markup)
                .map(|caps| text_of(&caps[1]))
                .filter(|text| !text.is_empty())
                .take(MAX_LOCATORS);
            for text in texts {
                let attr = unique_attr(&mut used, &format!("{}_{}", snake_case(&text), role));
                locators.push(Locator {
                    attr,
                    expr: format!(
                        "page.get_by_role(\"{}\", name=\"{}\")",
                        role,
                        py_escape(&text)
                    ),
                    fillable: false,
                });
            }
        }

        let class_name = class_name_for(url);
        debug!("生成 {} 代码，共 {} 个定位器", class_name, locators.len());
        Ok(render(&class_name, url, &locators))
    }
}

fn code_gen_error(e: regex::Error) -> CollaboratorError {
    CollaboratorError::CodeGeneration(e.to_string())
}

fn render(class_name: &str, url: &str, locators: &[Locator]) -> String {
    let url = py_escape(url);
    let mut out = String::new();

    out.push_str("from playwright.sync_api import Page, expect\n\n\n");
    out.push_str(&format!("class {}:\n", class_name));
    out.push_str(&format!("    URL = \"{}\"\n\n", url));
    out.push_str("    def __init__(self, page: Page):\n");
    out.push_str("        self.page = page\n");
    for locator in locators {
        out.push_str(&format!("        self.{} = {}\n", locator.attr, locator.expr));
    }
    out.push_str("\n    def goto(self):\n");
    out.push_str("        self.page.goto(self.URL)\n");

    // 同一个输入框可能既有 id 又有 name，只保留第一个 fill_ 方法
    let mut fill_methods = HashSet::new();
    for locator in locators.iter().filter(|l| l.fillable) {
        let method = locator.attr.trim_end_matches("_field");
        if !fill_methods.insert(method) {
            continue;
        }
        out.push_str(&format!(
            "\n    def fill_{}(self, value: str):\n        self.{}.fill(value)\n",
            method, locator.attr
        ));
    }
    for locator in locators
        .iter()
        .filter(|l| l.attr.ends_with("_button") || l.attr.ends_with("_link"))
    {
        out.push_str(&format!(
            "\n    def click_{}(self):\n        self.{}.click()\n",
            locator.attr, locator.attr
        ));
    }

    out.push_str("\n\ndef test_page_loads(page: Page):\n");
    out.push_str(&format!("    page_object = {}(page)\n", class_name));
    out.push_str("    page_object.goto()\n");
    out.push_str("    expect(page.locator(\"body\")).to_be_visible()\n");
    out
}

/// 从 URL 的主机名得到类名：`www.shop-example.com` → `ShopExampleComPage`
fn class_name_for(url: &str) -> String {
    let host = url
        .split("://")
        .nth(1)
        .unwrap_or(url)
        .split(['/', '?', '#', ':'])
        .next()
        .unwrap_or_default();
    let host = host.strip_prefix("www.").unwrap_or(host);

    let mut name: String = host
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect();

    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert_str(0, "Generated");
    }
    name.push_str("Page");
    name
}

/// 转成合法的 Python 标识符
fn snake_case(raw: &str) -> String {
    let mut out = String::new();
    let mut prev_lower = false;
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            if c.is_ascii_uppercase() && prev_lower {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
            prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        } else {
            if !out.ends_with('_') && !out.is_empty() {
                out.push('_');
            }
            prev_lower = false;
        }
    }
    let out = out.trim_matches('_').to_string();
    if out.is_empty() {
        "element".to_string()
    } else if out.starts_with(|c: char| c.is_ascii_digit()) {
        format!("el_{}", out)
    } else {
        out
    }
}

fn unique_attr(used: &mut HashSet<String>, base: &str) -> String {
    let mut candidate = base.to_string();
    let mut n = 2;
    while !used.insert(candidate.clone()) {
        candidate = format!("{}_{}", base, n);
        n += 1;
    }
    candidate
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn py_escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARKUP: &str = r#"
        <html><body>
          <h1 id="main-title">Shop</h1>
          <form id="loginForm">
            <input type="text" id="username" name="username">
            <input type="password" name="password">
            <button type="submit"><span>Sign in</span></button>
          </form>
          <a href="/about">About us</a>
          <a href="/about">About us</a>
        </body></html>
    "#;

    #[test]
    fn test_class_name_from_host() {
        assert_eq!(
            class_name_for("https://www.shop-example.com/cart?x=1"),
            "ShopExampleComPage"
        );
        assert_eq!(class_name_for("http://127.0.0.1:8080/"), "Generated127001Page");
        assert_eq!(class_name_for(""), "GeneratedPage");
    }

    #[test]
    fn test_generates_page_object() {
        let code = PlaywrightCodeGenerator::new()
            .generate(MARKUP, "https://shop.example.com/login")
            .unwrap();

        assert!(code.contains("class ShopExampleComPage:"));
        assert!(code.contains("URL = \"https://shop.example.com/login\""));
        assert!(code.contains("self.main_title = page.locator(\"#main-title\")"));
        assert!(code.contains("self.login_form = page.locator(\"#loginForm\")"));
        assert!(code.contains("self.username = page.locator(\"#username\")"));
        assert!(code.contains("self.password_field = page.locator('[name=\"password\"]')"));
        assert!(code.contains("self.sign_in_button = page.get_by_role(\"button\", name=\"Sign in\")"));
        assert!(code.contains("def fill_password(self, value: str):"));
        assert!(code.contains("def test_page_loads(page: Page):"));
    }

    #[test]
    fn test_duplicate_names_get_suffix() {
        let code = PlaywrightCodeGenerator::new()
            .generate(MARKUP, "https://shop.example.com")
            .unwrap();
        assert!(code.contains("self.about_us_link = "));
        assert!(code.contains("self.about_us_link_2 = "));
    }

    #[test]
    fn test_reserved_names_are_not_shadowed() {
        let markup = r#"<div id="page"></div><a id="goto" href="/next">Next</a>"#;
        let code = PlaywrightCodeGenerator::new()
            .generate(markup, "https://example.com")
            .unwrap();

        assert!(code.contains("        self.page = page\n"));
        assert!(code.contains("self.page_2 = page.locator(\"#page\")"));
        assert!(code.contains("self.goto_2 = page.locator(\"#goto\")"));
        assert!(!code.contains("self.page = page.locator"));
        assert!(!code.contains("self.goto = "));
        assert!(code.contains("    def goto(self):\n        self.page.goto(self.URL)\n"));
    }

    #[test]
    fn test_snake_case() {
        assert_eq!(snake_case("loginForm"), "login_form");
        assert_eq!(snake_case("main-title"), "main_title");
        assert_eq!(snake_case("2fa code"), "el_2fa_code");
        assert_eq!(snake_case("---"), "element");
    }
}
