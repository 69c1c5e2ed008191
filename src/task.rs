use crate::agent::Agent;
use crate::error::{CrewError, Result};
use crate::tools::{ToolCall, ToolOutput};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// What one completed task produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub task_id: usize,
    pub description: String,
    pub agent: String,
    pub call: ToolCall,
    pub output: ToolOutput,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

/// A unit of work bound to an agent. The result slot is written once.
pub struct Task {
    id: usize,
    description: String,
    agent: Arc<Agent>,
    depends_on: Option<usize>,
    status: TaskStatus,
    result: Option<TaskOutcome>,
    error: Option<String>,
}

impl Task {
    pub(crate) fn new(
        id: usize,
        description: String,
        agent: Arc<Agent>,
        depends_on: Option<usize>,
    ) -> Self {
        Self {
            id,
            description,
            agent,
            depends_on,
            status: TaskStatus::Pending,
            result: None,
            error: None,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn agent(&self) -> &Arc<Agent> {
        &self.agent
    }

    pub fn depends_on(&self) -> Option<usize> {
        self.depends_on
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn result(&self) -> Option<&TaskOutcome> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub(crate) fn start(&mut self) {
        self.status = TaskStatus::Running;
    }

    /// Store the result. A task that already has one is left untouched.
    pub(crate) fn complete(&mut self, outcome: TaskOutcome) -> Result<()> {
        if self.result.is_some() {
            return Err(CrewError::AlreadyCompleted(self.id));
        }
        self.result = Some(outcome);
        self.status = TaskStatus::Completed;
        Ok(())
    }

    pub(crate) fn fail(&mut self, error: &CrewError) {
        self.status = TaskStatus::Failed;
        self.error = Some(error.to_string());
    }
}
