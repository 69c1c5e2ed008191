use crate::agent::Agent;
use crate::error::{CrewError, Result};
use crate::task::{Task, TaskOutcome};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Runs tasks one after another in declaration order.
///
/// A task may only depend on a task declared before it, so declaration order
/// is always a valid execution order.
pub struct Crew {
    run_id: Uuid,
    tasks: Vec<Task>,
    has_run: bool,
}

impl Default for Crew {
    fn default() -> Self {
        Self::new()
    }
}

impl Crew {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            tasks: Vec::new(),
            has_run: false,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Append a task and return its index.
    pub fn add_task(
        &mut self,
        description: impl Into<String>,
        agent: Arc<Agent>,
        depends_on: Option<usize>,
    ) -> Result<usize> {
        let id = self.tasks.len();
        if let Some(dep) = depends_on {
            if dep >= id {
                return Err(CrewError::InvalidDependency(format!(
                    "task {} cannot depend on task {} (only tasks 0..{} exist)",
                    id, dep, id
                )));
            }
        }
        self.tasks
            .push(Task::new(id, description.into(), agent, depends_on));
        Ok(id)
    }

    /// Execute every task; stops at the first failure.
    pub async fn run(&mut self) -> Result<Vec<TaskOutcome>> {
        if self.has_run {
            return Err(CrewError::AlreadyRun);
        }
        self.has_run = true;

        tracing::info!("Crew {} starting {} tasks", self.run_id, self.tasks.len());
        let mut outcomes = Vec::with_capacity(self.tasks.len());

        for index in 0..self.tasks.len() {
            let dependency = match self.tasks[index].depends_on() {
                Some(dep) => {
                    let message = self.tasks[dep]
                        .result()
                        .map(|r| r.output.message.clone())
                        .ok_or_else(|| {
                            CrewError::InvalidDependency(format!(
                                "dependency {} of task {} has no result",
                                dep, index
                            ))
                        })?;
                    Some(message)
                }
                None => None,
            };

            let task = &mut self.tasks[index];
            task.start();
            let agent = task.agent().clone();
            let description = task.description().to_string();
            tracing::info!("Task {} [{}]: {}", index, agent.name(), description);

            let started_at = Utc::now();
            let timer = Instant::now();
            match agent.act(&description, dependency.as_deref()).await {
                Ok((call, output)) => {
                    let outcome = TaskOutcome {
                        task_id: index,
                        description,
                        agent: agent.name().to_string(),
                        call,
                        output,
                        started_at,
                        duration_ms: timer.elapsed().as_millis() as u64,
                    };
                    tracing::info!(
                        "Task {} done in {} ms: {}",
                        index,
                        outcome.duration_ms,
                        outcome.output.message
                    );
                    task.complete(outcome.clone())?;
                    outcomes.push(outcome);
                }
                Err(e) => {
                    tracing::error!("Task {} failed: {}", index, e);
                    task.fail(&e);
                    return Err(CrewError::TaskFailed {
                        index,
                        description,
                        source: Box::new(e),
                    });
                }
            }
        }

        tracing::info!("Crew {} finished", self.run_id);
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{DecisionMode, DirectPlan};
    use crate::browser::testing::FakeBrowser;
    use crate::task::TaskStatus;
    use crate::tools::{ClickParams, FillParams, InteractorTool, ToolCall};

    fn agent(browser: Arc<FakeBrowser>) -> Arc<Agent> {
        let plan = DirectPlan::new()
            .with(
                "Fill company",
                ToolCall::Fill(FillParams {
                    selector: "#company".to_string(),
                    value: "Acme".to_string(),
                }),
            )
            .with(
                "Copy confirmation",
                ToolCall::Fill(FillParams {
                    selector: "#obs".to_string(),
                    value: "${dependency}".to_string(),
                }),
            )
            .with(
                "Add service",
                ToolCall::Click(ClickParams {
                    selector: "#add-service".to_string(),
                }),
            );
        Arc::new(
            Agent::new("filler", "Fills", DecisionMode::Direct(plan))
                .with_tool(Arc::new(InteractorTool::new(browser))),
        )
    }

    #[test]
    fn test_rejects_forward_and_self_dependencies() {
        let mut crew = Crew::new();
        let a = agent(Arc::new(FakeBrowser::new()));

        assert!(matches!(
            crew.add_task("Fill company", a.clone(), Some(0)),
            Err(CrewError::InvalidDependency(_))
        ));
        let first = crew.add_task("Fill company", a.clone(), None).unwrap();
        assert!(matches!(
            crew.add_task("Add service", a.clone(), Some(5)),
            Err(CrewError::InvalidDependency(_))
        ));
        assert_eq!(crew.add_task("Add service", a, Some(first)).unwrap(), 1);
        assert_eq!(crew.tasks().len(), 2);
    }

    #[tokio::test]
    async fn test_dependency_result_threaded() {
        let browser = Arc::new(FakeBrowser::new());
        let a = agent(browser.clone());
        let mut crew = Crew::new();
        let first = crew.add_task("Fill company", a.clone(), None).unwrap();
        crew.add_task("Copy confirmation", a, Some(first)).unwrap();

        let outcomes = crew.run().await.unwrap();
        assert_eq!(outcomes.len(), 2);
        assert_eq!(
            browser.calls(),
            vec![
                "fill #company=Acme",
                "fill #obs=Filled #company with 'Acme'"
            ]
        );
        assert!(crew
            .tasks()
            .iter()
            .all(|t| t.status() == TaskStatus::Completed));
    }

    #[tokio::test]
    async fn test_stops_on_first_failure() {
        let browser = Arc::new(FakeBrowser::new());
        let a = agent(browser.clone());
        let mut crew = Crew::new();
        crew.add_task("Fill company", a.clone(), None).unwrap();
        crew.add_task("Order pizza", a.clone(), None).unwrap();
        crew.add_task("Add service", a, None).unwrap();

        let err = crew.run().await.unwrap_err();
        match err {
            CrewError::TaskFailed {
                index,
                description,
                source,
            } => {
                assert_eq!(index, 1);
                assert_eq!(description, "Order pizza");
                assert!(matches!(*source, CrewError::UnknownTask(_)));
            }
            other => panic!("unexpected error: {other}"),
        }

        let statuses: Vec<TaskStatus> = crew.tasks().iter().map(|t| t.status()).collect();
        assert_eq!(
            statuses,
            vec![
                TaskStatus::Completed,
                TaskStatus::Failed,
                TaskStatus::Pending
            ]
        );
        assert_eq!(browser.calls(), vec!["fill #company=Acme"]);
    }

    #[tokio::test]
    async fn test_runs_once() {
        let mut crew = Crew::new();
        crew.add_task("Fill company", agent(Arc::new(FakeBrowser::new())), None)
            .unwrap();
        crew.run().await.unwrap();
        assert!(matches!(crew.run().await, Err(CrewError::AlreadyRun)));
    }

    #[tokio::test]
    async fn test_empty_crew() {
        let mut crew = Crew::default();
        assert!(crew.run().await.unwrap().is_empty());
    }
}
