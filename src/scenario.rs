//! The pricing-form crew: open the system, fill the form, download the quote.

use crate::agent::{Agent, DecisionMode, DirectPlan};
use crate::browser::BrowserDriver;
use crate::config::schema::{AppConfig, FormStep};
use crate::crew::Crew;
use crate::error::{CrewError, Result};
use crate::llm::LlmManager;
use crate::memory::{ContextualMemory, Summarizer};
use crate::tools::{
    ClickParams, DownloadPdfParams, DownloadTool, FillParams, InteractorTool, NavigateParams,
    NavigatorTool, SelectOptionParams, ToolCall,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Scripted task-to-tool mapping
    Direct,
    /// Tool calls chosen by the LLM
    Llm,
}

/// One planned task: who runs it, what it says, and its scripted call.
struct PlannedTask {
    agent: usize,
    description: String,
    call: ToolCall,
}

const NAVIGATOR: usize = 0;
const FILLER: usize = 1;
const DOWNLOADER: usize = 2;

fn describe(step: &FormStep) -> (String, ToolCall) {
    match step {
        FormStep::Fill {
            label,
            selector,
            value,
        } => (
            format!("Fill the {} field ({}) with '{}'", label, selector, value),
            ToolCall::Fill(FillParams {
                selector: selector.clone(),
                value: value.clone(),
            }),
        ),
        FormStep::Click { label, selector } => (
            format!("Click the {} button ({})", label, selector),
            ToolCall::Click(ClickParams {
                selector: selector.clone(),
            }),
        ),
        FormStep::Select {
            label,
            selector,
            option,
        } => (
            format!("Select '{}' in the {} field ({})", option, label, selector),
            ToolCall::SelectOption(SelectOptionParams {
                selector: selector.clone(),
                label: option.clone(),
            }),
        ),
    }
}

fn plan_tasks(config: &AppConfig) -> Vec<PlannedTask> {
    let mut tasks = vec![PlannedTask {
        agent: NAVIGATOR,
        description: format!("Open the pricing system at {}", config.form.url),
        call: ToolCall::Navigate(NavigateParams {
            url: config.form.url.clone(),
        }),
    }];

    for step in &config.form.steps {
        let (description, call) = describe(step);
        tasks.push(PlannedTask {
            agent: FILLER,
            description,
            call,
        });
    }

    let description = match &config.form.download_selector {
        Some(selector) => format!(
            "Download the quote PDF by clicking {} and save it to {}",
            selector,
            config.output.dir.display()
        ),
        None => format!(
            "Save the current page as the quote PDF in {}",
            config.output.dir.display()
        ),
    };
    tasks.push(PlannedTask {
        agent: DOWNLOADER,
        description,
        call: ToolCall::DownloadPdf(DownloadPdfParams {
            selector: config.form.download_selector.clone(),
            timeout_ms: None,
        }),
    });

    tasks
}

/// Build the crew for `mode`. Every task depends on the one before it.
pub fn build_crew(
    config: &AppConfig,
    mode: RunMode,
    browser: Arc<dyn BrowserDriver>,
    llm: Option<Arc<LlmManager>>,
) -> Result<Crew> {
    let llm = match mode {
        RunMode::Llm => match llm {
            Some(llm) if !llm.is_empty() => Some(llm),
            _ => return Err(CrewError::MissingLlm("navigator".to_string())),
        },
        RunMode::Direct => None,
    };

    let summarizer = llm.clone().map(|m| m as Arc<dyn Summarizer>);
    let memory = Arc::new(ContextualMemory::new(&config.memory, summarizer));

    let tasks = plan_tasks(config);
    let mut plans = vec![DirectPlan::new(), DirectPlan::new(), DirectPlan::new()];
    for task in &tasks {
        plans[task.agent].insert(&task.description, task.call.clone());
    }

    let roles = [
        ("navigator", "Opens the pricing system in the browser"),
        ("filler", "Fills in and submits the fields of the pricing form"),
        ("downloader", "Downloads the generated quote PDF"),
    ];
    let tools: [Arc<dyn crate::tools::Tool>; 3] = [
        Arc::new(NavigatorTool::new(browser.clone())),
        Arc::new(InteractorTool::new(browser.clone())),
        Arc::new(DownloadTool::new(
            browser,
            config.output.dir.clone(),
            config.output.download_timeout_ms,
        )),
    ];

    let agents: Vec<Arc<Agent>> = roles
        .iter()
        .zip(plans)
        .zip(tools)
        .map(|(((name, role), plan), tool)| {
            let decision = match mode {
                RunMode::Direct => DecisionMode::Direct(plan),
                RunMode::Llm => DecisionMode::Llm,
            };
            let mut agent = Agent::new(*name, *role, decision)
                .with_tool(tool)
                .with_memory(memory.clone());
            if let Some(llm) = &llm {
                agent = agent.with_llm(llm.clone());
            }
            Arc::new(agent)
        })
        .collect();

    let mut crew = Crew::new();
    let mut previous = None;
    for task in tasks {
        let id = crew.add_task(task.description, agents[task.agent].clone(), previous)?;
        previous = Some(id);
    }

    tracing::info!(
        "Built {:?} crew with {} tasks (run {})",
        mode,
        crew.tasks().len(),
        crew.run_id()
    );
    Ok(crew)
}
