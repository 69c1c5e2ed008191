pub mod call;
pub mod download;
pub mod interactor;
pub mod navigator;

pub use call::{
    parse_directive, tool_spec, ClickParams, DownloadPdfParams, FillParams, NavigateParams,
    SelectOptionParams, ToolCall, ToolSpec, WaitForParams, TOOL_NAMES,
};
pub use download::{quote_file_name, DownloadTool};
pub use interactor::InteractorTool;
pub use navigator::NavigatorTool;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// What a tool reports back after running a call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolOutput {
    /// Human-readable result
    pub message: String,
    /// Structured details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ToolOutput {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// A capability an agent carries. One tool executes one or more directive
/// names.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    /// Directive names this tool executes
    fn handles(&self) -> &'static [&'static str];

    async fn invoke(&self, call: &ToolCall) -> Result<ToolOutput>;

    /// Prompt entries for the directives this tool executes
    fn specs(&self) -> Vec<ToolSpec> {
        self.handles().iter().filter_map(|n| tool_spec(n)).collect()
    }
}
