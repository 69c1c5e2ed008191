use crate::error::{CrewError, Result};
use crate::tools::ToolCall;
use serde_json::Value;
use std::collections::HashMap;

/// Placeholder replaced with the dependency's result message.
pub const DEPENDENCY_PLACEHOLDER: &str = "${dependency}";

/// Fixed mapping from task descriptions to tool calls.
#[derive(Debug, Clone, Default)]
pub struct DirectPlan {
    calls: HashMap<String, ToolCall>,
}

impl DirectPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, description: impl AsRef<str>, call: ToolCall) -> Self {
        self.insert(description, call);
        self
    }

    pub fn insert(&mut self, description: impl AsRef<str>, call: ToolCall) {
        self.calls.insert(normalize(description.as_ref()), call);
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Look up the call for `description`, substituting the dependency
    /// result into any `${dependency}` parameter.
    pub fn resolve(&self, description: &str, dependency: Option<&str>) -> Result<ToolCall> {
        let call = self
            .calls
            .get(&normalize(description))
            .ok_or_else(|| CrewError::UnknownTask(description.to_string()))?;

        let Some(dependency) = dependency else {
            return Ok(call.clone());
        };

        let parameters = substitute(call.parameters(), dependency);
        ToolCall::from_parts(call.name(), parameters)
    }
}

fn normalize(description: &str) -> String {
    description.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn substitute(value: Value, dependency: &str) -> Value {
    match value {
        Value::String(s) => Value::String(s.replace(DEPENDENCY_PLACEHOLDER, dependency)),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|v| substitute(v, dependency))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, substitute(v, dependency)))
                .collect(),
        ),
        other => other,
    }
}
