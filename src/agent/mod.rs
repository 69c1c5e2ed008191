pub mod direct;
pub mod prompt;

pub use direct::{DirectPlan, DEPENDENCY_PLACEHOLDER};

use crate::error::{CrewError, Result};
use crate::llm::prompt::estimate_tokens;
use crate::llm::LlmManager;
use crate::memory::{ContextualMemory, MemoryEntry};
use crate::tools::{parse_directive, Tool, ToolCall, ToolOutput, ToolSpec};
use std::sync::Arc;

const OWN_HISTORY_LIMIT: usize = 5;
const SHARED_CONTEXT_LIMIT: usize = 10;

/// How an agent turns a task description into a tool call.
#[derive(Debug, Clone)]
pub enum DecisionMode {
    /// Scripted mapping, no LLM involved
    Direct(DirectPlan),
    /// The LLM manager picks the call
    Llm,
}

/// A role bound to tools, an optional LLM manager and optional shared memory.
pub struct Agent {
    name: String,
    role: String,
    mode: DecisionMode,
    llm: Option<Arc<LlmManager>>,
    tools: Vec<Arc<dyn Tool>>,
    memory: Option<Arc<ContextualMemory>>,
}

impl Agent {
    pub fn new(name: impl Into<String>, role: impl Into<String>, mode: DecisionMode) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
            mode,
            llm: None,
            tools: Vec::new(),
            memory: None,
        }
    }

    pub fn with_llm(mut self, llm: Arc<LlmManager>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn with_memory(mut self, memory: Arc<ContextualMemory>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn mode(&self) -> &DecisionMode {
        &self.mode
    }

    /// Directive names this agent can execute.
    pub fn available_tools(&self) -> Vec<String> {
        self.tools
            .iter()
            .flat_map(|t| t.handles().iter().map(|n| n.to_string()))
            .collect()
    }

    fn specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().flat_map(|t| t.specs()).collect()
    }

    fn tool_for(&self, call: &ToolCall) -> Result<&Arc<dyn Tool>> {
        self.tools
            .iter()
            .find(|t| t.handles().contains(&call.name()))
            .ok_or_else(|| CrewError::UnknownTool {
                name: call.name().to_string(),
                available: self.available_tools(),
            })
    }

    /// Pick the tool call for `description`. `dependency` is the result of
    /// the task this one depends on.
    pub async fn decide(&self, description: &str, dependency: Option<&str>) -> Result<ToolCall> {
        let call = match &self.mode {
            DecisionMode::Direct(plan) => plan.resolve(description, dependency)?,
            DecisionMode::Llm => self.decide_with_llm(description, dependency).await?,
        };
        self.tool_for(&call)?;
        tracing::debug!(
            "{} decided {} {}",
            self.name,
            call.name(),
            call.parameters()
        );
        Ok(call)
    }

    async fn decide_with_llm(&self, description: &str, dependency: Option<&str>) -> Result<ToolCall> {
        let llm = self
            .llm
            .as_ref()
            .ok_or_else(|| CrewError::MissingLlm(self.name.clone()))?;

        let system = prompt::build_system_prompt(&self.name, &self.role);
        let budget = llm.prompt_budget().saturating_sub(estimate_tokens(&system));

        let (own_history, shared) = match &self.memory {
            Some(memory) => {
                let own: Vec<String> = memory
                    .history_for(&self.name, OWN_HISTORY_LIMIT)
                    .await
                    .into_iter()
                    .map(|e: MemoryEntry| e.content)
                    .collect();
                let shared = memory
                    .formatted_context_within(SHARED_CONTEXT_LIMIT, budget / 2)
                    .await;
                (own, shared)
            }
            None => (Vec::new(), String::new()),
        };

        let user = prompt::build_decision_prompt(
            description,
            dependency,
            &own_history,
            &shared,
            &self.specs(),
            budget,
        );
        if estimate_tokens(&user) > budget {
            tracing::warn!(
                "{} prompt needs ~{} tokens, over the {} token budget",
                self.name,
                estimate_tokens(&user),
                budget
            );
        }

        let response = llm.ask_with_system(&system, &user).await?;
        tracing::debug!("{} LLM response: {}", self.name, response);
        parse_directive(&response)
    }

    /// Decide, invoke the chosen tool and record the interaction.
    pub async fn act(
        &self,
        description: &str,
        dependency: Option<&str>,
    ) -> Result<(ToolCall, ToolOutput)> {
        let call = match self.decide(description, dependency).await {
            Ok(call) => call,
            Err(e) => {
                self.remember_failure(description, None, &e);
                return Err(e);
            }
        };

        let tool = self.tool_for(&call)?;
        tracing::info!("{} -> {} via {}", self.name, call.name(), tool.name());

        match tool.invoke(&call).await {
            Ok(output) => {
                if let Some(memory) = &self.memory {
                    memory.record(
                        &self.name,
                        format!(
                            "Task: {}\nAction: {} {}\nResult: {}",
                            description,
                            call.name(),
                            call.parameters(),
                            output.message
                        ),
                    );
                    memory.broadcast(&self.name, format!("[{}]: {}", self.name, output.message));
                }
                Ok((call, output))
            }
            Err(e) => {
                tracing::error!("{} failed {}: {}", self.name, call.name(), e);
                self.remember_failure(description, Some(&call), &e);
                Err(e)
            }
        }
    }

    fn remember_failure(&self, description: &str, call: Option<&ToolCall>, error: &CrewError) {
        let Some(memory) = &self.memory else {
            return;
        };
        let action = match call {
            Some(call) => format!("{} {}", call.name(), call.parameters()),
            None => "none".to_string(),
        };
        memory.record_important(
            &self.name,
            format!(
                "Task: {}\nAction: {}\nError: {}",
                description, action, error
            ),
        );
    }
}
