//! 页面访问 - 基础设施层
//!
//! 一个已导航的 `Page` 只交给一个 `JsExecutor`，检查和扫描都通过它读页面

use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::BrowserError;

/// 表达式结果外面包的一层，`null` / `undefined` 也能正常反序列化
#[derive(Deserialize)]
struct Wrapped<T> {
    value: T,
}

pub struct JsExecutor {
    page: Page,
}

impl JsExecutor {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// 导航等需要直接操作页面的场景
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// 执行脚本（可以是返回 Promise 的 async IIFE），结果必须是对象或数组
    pub async fn eval_as<T: DeserializeOwned>(
        &self,
        script: impl Into<String>,
    ) -> Result<T, BrowserError> {
        let result = self.page.evaluate(script.into()).await?;
        Ok(result.into_value()?)
    }

    /// 求值单个表达式，返回值可以是任意 JSON，包括 null
    pub async fn read<T: DeserializeOwned>(&self, expr: &str) -> Result<T, BrowserError> {
        let wrapped: Wrapped<T> = self.eval_as(wrap_expression(expr)).await?;
        Ok(wrapped.value)
    }

    /// 当前 DOM 序列化后的 HTML
    pub async fn html(&self) -> Result<String, BrowserError> {
        Ok(self.page.content().await?)
    }

    /// 整页 PNG 截图
    pub async fn full_page_png(&self) -> Result<Vec<u8>, BrowserError> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(true)
            .build();
        self.page
            .screenshot(params)
            .await
            .map_err(|e| BrowserError::ScreenshotFailed(e.to_string()))
    }
}

fn wrap_expression(expr: &str) -> String {
    format!("({{ value: {} }})", expr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_expression() {
        assert_eq!(
            wrap_expression("document.title || ''"),
            "({ value: document.title || '' })"
        );
    }

    #[test]
    fn test_wrapped_null_value() {
        let wrapped: Wrapped<Option<String>> =
            serde_json::from_value(serde_json::json!({ "value": null })).unwrap();
        assert_eq!(wrapped.value, None);

        let wrapped: Wrapped<Vec<Option<String>>> =
            serde_json::from_value(serde_json::json!({ "value": ["a", null] })).unwrap();
        assert_eq!(wrapped.value, vec![Some("a".to_string()), None]);
    }
}
