use crate::browser::BrowserDriver;
use crate::error::{CrewError, Result};
use crate::tools::{Tool, ToolCall, ToolOutput};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

/// Fills inputs, clicks controls and picks options on the current page.
pub struct InteractorTool {
    browser: Arc<dyn BrowserDriver>,
}

impl InteractorTool {
    pub fn new(browser: Arc<dyn BrowserDriver>) -> Self {
        Self { browser }
    }
}

#[async_trait]
impl Tool for InteractorTool {
    fn name(&self) -> &str {
        "interactor"
    }

    fn handles(&self) -> &'static [&'static str] {
        &["fill", "click", "select_option"]
    }

    async fn invoke(&self, call: &ToolCall) -> Result<ToolOutput> {
        match call {
            ToolCall::Fill(p) => {
                self.browser
                    .fill(&p.selector, &p.value)
                    .await
                    .map_err(|e| CrewError::tool("fill", e.to_string()))?;
                Ok(
                    ToolOutput::new(format!("Filled {} with '{}'", p.selector, p.value))
                        .with_data(json!({ "selector": p.selector, "value": p.value })),
                )
            }
            ToolCall::Click(p) => {
                self.browser
                    .click(&p.selector)
                    .await
                    .map_err(|e| CrewError::tool("click", e.to_string()))?;
                Ok(ToolOutput::new(format!("Clicked {}", p.selector))
                    .with_data(json!({ "selector": p.selector })))
            }
            ToolCall::SelectOption(p) => {
                self.browser
                    .select_option(&p.selector, &p.label)
                    .await
                    .map_err(|e| CrewError::tool("select_option", e.to_string()))?;
                Ok(
                    ToolOutput::new(format!("Selected '{}' in {}", p.label, p.selector))
                        .with_data(json!({ "selector": p.selector, "label": p.label })),
                )
            }
            other => Err(CrewError::tool(
                self.name(),
                format!("cannot execute '{}'", other.name()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::testing::FakeBrowser;
    use crate::tools::{ClickParams, FillParams, SelectOptionParams};

    #[tokio::test]
    async fn test_fill_confirms_value() {
        let browser = Arc::new(FakeBrowser::new());
        let tool = InteractorTool::new(browser.clone());

        let output = tool
            .invoke(&ToolCall::Fill(FillParams {
                selector: "#company".to_string(),
                value: "Acme".to_string(),
            }))
            .await
            .unwrap();

        assert_eq!(output.message, "Filled #company with 'Acme'");
        assert_eq!(output.data.unwrap()["value"], "Acme");
        assert_eq!(browser.calls(), vec!["fill #company=Acme"]);
    }

    #[tokio::test]
    async fn test_click_and_select() {
        let browser = Arc::new(FakeBrowser::new());
        let tool = InteractorTool::new(browser.clone());

        tool.invoke(&ToolCall::SelectOption(SelectOptionParams {
            selector: "#plano".to_string(),
            label: "Mensal".to_string(),
        }))
        .await
        .unwrap();
        let output = tool
            .invoke(&ToolCall::Click(ClickParams {
                selector: "#add-service".to_string(),
            }))
            .await
            .unwrap();

        assert_eq!(output.message, "Clicked #add-service");
        assert_eq!(
            browser.calls(),
            vec!["select #plano=Mensal", "click #add-service"]
        );
    }

    #[tokio::test]
    async fn test_missing_element_is_tool_error() {
        let browser = Arc::new(FakeBrowser::new().missing("#add-service"));
        let tool = InteractorTool::new(browser);

        let err = tool
            .invoke(&ToolCall::Click(ClickParams {
                selector: "#add-service".to_string(),
            }))
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("click"));
        assert!(msg.contains("#add-service"));
    }
}
