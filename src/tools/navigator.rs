use crate::browser::BrowserDriver;
use crate::error::{CrewError, Result};
use crate::tools::{Tool, ToolCall, ToolOutput};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

/// Opens pages and waits for elements.
pub struct NavigatorTool {
    browser: Arc<dyn BrowserDriver>,
}

impl NavigatorTool {
    pub fn new(browser: Arc<dyn BrowserDriver>) -> Self {
        Self { browser }
    }
}

#[async_trait]
impl Tool for NavigatorTool {
    fn name(&self) -> &str {
        "navigator"
    }

    fn handles(&self) -> &'static [&'static str] {
        &["navigate", "wait_for"]
    }

    async fn invoke(&self, call: &ToolCall) -> Result<ToolOutput> {
        match call {
            ToolCall::Navigate(p) => {
                self.browser
                    .navigate(&p.url)
                    .await
                    .map_err(|e| CrewError::tool("navigate", e.to_string()))?;
                let title = match self.browser.title().await {
                    Ok(title) => title,
                    Err(e) => {
                        tracing::debug!("Could not read title after navigating: {}", e);
                        None
                    }
                };
                let final_url = match self.browser.current_url().await {
                    Ok(url) if !url.is_empty() => Some(url),
                    Ok(_) => None,
                    Err(e) => {
                        tracing::debug!("Could not read URL after navigating: {}", e);
                        None
                    }
                };

                let mut message = format!("Navigated to {}", p.url);
                if let Some(landed) = final_url.as_deref().filter(|u| *u != p.url) {
                    message.push_str(&format!(" (redirected to {})", landed));
                }
                if let Some(title) = &title {
                    message.push_str(&format!(" ({})", title));
                }
                Ok(ToolOutput::new(message).with_data(json!({
                    "url": p.url,
                    "final_url": final_url,
                    "title": title,
                })))
            }
            ToolCall::WaitFor(p) => {
                self.browser
                    .wait_for(&p.selector, p.timeout_ms)
                    .await
                    .map_err(|e| CrewError::tool("wait_for", e.to_string()))?;
                Ok(ToolOutput::new(format!("Element {} is present", p.selector)))
            }
            other => Err(CrewError::tool(
                self.name(),
                format!("cannot execute '{}'", other.name()),
            )),
        }
    }
}
