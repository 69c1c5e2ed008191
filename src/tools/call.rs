use crate::error::{CrewError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct NavigateParams {
    /// Absolute URL to open
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct FillParams {
    /// CSS selector of the input
    pub selector: String,
    /// Text to put in the input
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ClickParams {
    /// CSS selector of the element to click
    pub selector: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SelectOptionParams {
    /// CSS selector of the `<select>` element
    pub selector: String,
    /// Visible text (or value) of the option to pick
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct WaitForParams {
    /// CSS selector to wait for
    pub selector: String,
    /// Give up after this many milliseconds
    #[serde(default = "default_wait_timeout")]
    pub timeout_ms: u64,
}

fn default_wait_timeout() -> u64 {
    10_000
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct DownloadPdfParams {
    /// Button that triggers the download; the page is printed when absent
    #[serde(default)]
    pub selector: Option<String>,
    /// Maximum wait for the download to finish
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// The closed set of browser actions an agent can request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "tool_name", content = "parameters", rename_all = "snake_case")]
pub enum ToolCall {
    Navigate(NavigateParams),
    Fill(FillParams),
    Click(ClickParams),
    SelectOption(SelectOptionParams),
    WaitFor(WaitForParams),
    DownloadPdf(DownloadPdfParams),
}

/// Every directive name, in prompt order.
pub const TOOL_NAMES: &[&str] = &[
    "navigate",
    "fill",
    "click",
    "select_option",
    "wait_for",
    "download_pdf",
];

impl ToolCall {
    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::Navigate(_) => "navigate",
            ToolCall::Fill(_) => "fill",
            ToolCall::Click(_) => "click",
            ToolCall::SelectOption(_) => "select_option",
            ToolCall::WaitFor(_) => "wait_for",
            ToolCall::DownloadPdf(_) => "download_pdf",
        }
    }

    /// Parameters as a JSON object
    pub fn parameters(&self) -> Value {
        let value = match self {
            ToolCall::Navigate(p) => serde_json::to_value(p),
            ToolCall::Fill(p) => serde_json::to_value(p),
            ToolCall::Click(p) => serde_json::to_value(p),
            ToolCall::SelectOption(p) => serde_json::to_value(p),
            ToolCall::WaitFor(p) => serde_json::to_value(p),
            ToolCall::DownloadPdf(p) => serde_json::to_value(p),
        };
        value.unwrap_or(Value::Null)
    }

    /// Validate a tool name and parameter object into a call.
    pub fn from_parts(tool_name: &str, parameters: Value) -> Result<Self> {
        fn params<T: serde::de::DeserializeOwned>(tool: &str, value: Value) -> Result<T> {
            serde_json::from_value(value).map_err(|e| {
                CrewError::Parse(format!("invalid parameters for '{}': {}", tool, e))
            })
        }

        let parameters = match parameters {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };

        match tool_name {
            "navigate" => Ok(ToolCall::Navigate(params(tool_name, parameters)?)),
            "fill" => Ok(ToolCall::Fill(params(tool_name, parameters)?)),
            "click" => Ok(ToolCall::Click(params(tool_name, parameters)?)),
            "select_option" => Ok(ToolCall::SelectOption(params(tool_name, parameters)?)),
            "wait_for" => Ok(ToolCall::WaitFor(params(tool_name, parameters)?)),
            "download_pdf" => Ok(ToolCall::DownloadPdf(params(tool_name, parameters)?)),
            other => Err(CrewError::UnknownTool {
                name: other.to_string(),
                available: TOOL_NAMES.iter().map(|s| s.to_string()).collect(),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Directive {
    tool_name: String,
    #[serde(default)]
    parameters: Value,
}

/// Parse an LLM answer into a tool call.
///
/// Prose and Markdown fences around the JSON object are ignored: the text
/// from the first `{` to the last `}` must be a `{"tool_name", "parameters"}`
/// object.
pub fn parse_directive(content: &str) -> Result<ToolCall> {
    let (start, end) = match (content.find('{'), content.rfind('}')) {
        (Some(start), Some(end)) if start < end => (start, end),
        _ => {
            return Err(CrewError::Parse(format!(
                "no JSON object in response: {}",
                content.chars().take(200).collect::<String>()
            )))
        }
    };

    let directive: Directive = serde_json::from_str(&content[start..=end])
        .map_err(|e| CrewError::Parse(format!("malformed directive: {}", e)))?;

    ToolCall::from_parts(directive.tool_name.trim(), directive.parameters)
}

/// Name, description and parameter schema of one directive, for prompts.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

fn schema_of<T: JsonSchema>() -> Value {
    serde_json::to_value(schemars::schema_for!(T)).unwrap_or(Value::Null)
}

/// Prompt entry for a directive name, if it exists.
pub fn tool_spec(name: &str) -> Option<ToolSpec> {
    let (name, description, parameters) = match name {
        "navigate" => (
            "navigate",
            "Open a URL in the browser and wait for the page to load",
            schema_of::<NavigateParams>(),
        ),
        "fill" => (
            "fill",
            "Type a value into a form field",
            schema_of::<FillParams>(),
        ),
        "click" => (
            "click",
            "Click a button, link or other element",
            schema_of::<ClickParams>(),
        ),
        "select_option" => (
            "select_option",
            "Choose an option of a <select> element",
            schema_of::<SelectOptionParams>(),
        ),
        "wait_for" => (
            "wait_for",
            "Wait until an element appears on the page",
            schema_of::<WaitForParams>(),
        ),
        "download_pdf" => (
            "download_pdf",
            "Download the generated quote PDF into the output directory",
            schema_of::<DownloadPdfParams>(),
        ),
        _ => return None,
    };
    Some(ToolSpec {
        name,
        description,
        parameters,
    })
}
