//! Crew runs with scripted (direct-mode) agents against a recording browser.

mod common;

use common::RecordingBrowser;
use quotecrew_lib::agent::{Agent, DecisionMode, DirectPlan};
use quotecrew_lib::config::MemoryConfig;
use quotecrew_lib::memory::ContextualMemory;
use quotecrew_lib::tools::{
    ClickParams, DownloadPdfParams, DownloadTool, FillParams, InteractorTool, NavigateParams,
    NavigatorTool, ToolCall,
};
use quotecrew_lib::{Crew, CrewError, TaskStatus};
use std::sync::Arc;

const URL: &str = "http://localhost:5000/";

fn navigate() -> ToolCall {
    ToolCall::Navigate(NavigateParams {
        url: URL.to_string(),
    })
}

fn fill_company() -> ToolCall {
    ToolCall::Fill(FillParams {
        selector: "#company".to_string(),
        value: "Acme".to_string(),
    })
}

fn add_service() -> ToolCall {
    ToolCall::Click(ClickParams {
        selector: "#add-service".to_string(),
    })
}

struct Setup {
    browser: Arc<RecordingBrowser>,
    memory: Arc<ContextualMemory>,
    navigator: Arc<Agent>,
    filler: Arc<Agent>,
}

fn setup(browser: Arc<RecordingBrowser>) -> Setup {
    let memory = Arc::new(ContextualMemory::new(&MemoryConfig::default(), None));
    let navigator = Agent::new(
        "navigator",
        "Opens pages",
        DecisionMode::Direct(DirectPlan::new().with("Open the pricing system", navigate())),
    )
    .with_tool(Arc::new(NavigatorTool::new(browser.clone())))
    .with_memory(memory.clone());

    let filler = Agent::new(
        "filler",
        "Fills the form",
        DecisionMode::Direct(
            DirectPlan::new()
                .with("Fill the company field with Acme", fill_company())
                .with("Add a service", add_service()),
        ),
    )
    .with_tool(Arc::new(InteractorTool::new(browser.clone())))
    .with_memory(memory.clone());

    Setup {
        browser,
        memory,
        navigator: Arc::new(navigator),
        filler: Arc::new(filler),
    }
}

// ── direct end-to-end ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_direct_three_tasks_in_order() {
    let s = setup(RecordingBrowser::new());
    let mut crew = Crew::new();
    let open = crew
        .add_task("Open the pricing system", s.navigator.clone(), None)
        .unwrap();
    let fill = crew
        .add_task("Fill the company field with Acme", s.filler.clone(), Some(open))
        .unwrap();
    crew.add_task("Add a service", s.filler.clone(), Some(fill))
        .unwrap();

    let outcomes = crew.run().await.unwrap();

    assert_eq!(outcomes.len(), 3);
    let ids: Vec<usize> = outcomes.iter().map(|o| o.task_id).collect();
    assert_eq!(ids, vec![0, 1, 2]);

    assert_eq!(outcomes[0].call, navigate());
    assert_eq!(outcomes[1].call, fill_company());
    assert_eq!(outcomes[1].output.message, "Filled #company with 'Acme'");
    assert_eq!(outcomes[2].output.message, "Clicked #add-service");

    assert_eq!(
        s.browser.calls(),
        vec![
            format!("navigate {}", URL),
            "fill #company=Acme".to_string(),
            "click #add-service".to_string(),
        ]
    );

    // Each task started no earlier than the one it depends on
    assert!(outcomes[1].started_at >= outcomes[0].started_at);
    assert!(outcomes[2].started_at >= outcomes[1].started_at);
}

#[tokio::test]
async fn test_direct_mapping_is_stable_across_runs() {
    let mut calls = Vec::new();
    for _ in 0..3 {
        let s = setup(RecordingBrowser::new());
        let call = s
            .filler
            .decide("Fill the company field with Acme", None)
            .await
            .unwrap();
        calls.push(call);
    }
    assert!(calls.iter().all(|c| *c == fill_company()));
}

#[tokio::test]
async fn test_unknown_description_fails_run() {
    let s = setup(RecordingBrowser::new());
    let mut crew = Crew::new();
    crew.add_task("Open the pricing system", s.navigator.clone(), None)
        .unwrap();
    crew.add_task("Fill the phone field", s.filler.clone(), Some(0))
        .unwrap();

    let err = crew.run().await.unwrap_err();
    assert!(matches!(
        err,
        CrewError::TaskFailed { index: 1, ref source, .. } if matches!(**source, CrewError::UnknownTask(_))
    ));
    assert_eq!(crew.tasks()[1].status(), TaskStatus::Failed);
}

#[tokio::test]
async fn test_tool_error_aborts_and_is_remembered() {
    let s = setup(RecordingBrowser::with_missing(&["#add-service"]));
    let mut crew = Crew::new();
    crew.add_task("Add a service", s.filler.clone(), None)
        .unwrap();
    crew.add_task("Fill the company field with Acme", s.filler.clone(), Some(0))
        .unwrap();

    let err = crew.run().await.unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("Task 0"));
    assert!(msg.contains("#add-service"));

    // Second task never ran
    assert!(s.browser.calls().is_empty());
    assert_eq!(crew.tasks()[1].status(), TaskStatus::Pending);

    let history = s.memory.history_for("filler", 10).await;
    assert_eq!(history.len(), 1);
    assert!(history[0].important);
}

#[tokio::test]
async fn test_memory_records_each_task() {
    let s = setup(RecordingBrowser::new());
    let mut crew = Crew::new();
    crew.add_task("Open the pricing system", s.navigator.clone(), None)
        .unwrap();
    crew.add_task("Fill the company field with Acme", s.filler.clone(), Some(0))
        .unwrap();
    crew.run().await.unwrap();

    // One own entry and one broadcast per task
    assert_eq!(s.memory.len(), 4);
    let context = s.memory.formatted_context(10).await;
    assert!(context.contains("[navigator] [navigator]: Navigated to http://localhost:5000/"));
    assert!(context.contains("[filler] [filler]: Filled #company with 'Acme'"));
}

// ── download ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_download_depends_on_last_step() {
    let dir = tempfile::tempdir().unwrap();
    let s = setup(RecordingBrowser::new());
    let downloader = Arc::new(
        Agent::new(
            "downloader",
            "Downloads the quote",
            DecisionMode::Direct(DirectPlan::new().with(
                "Download the quote",
                ToolCall::DownloadPdf(DownloadPdfParams {
                    selector: Some("#gerar-pdf".to_string()),
                    timeout_ms: Some(2_000),
                }),
            )),
        )
        .with_tool(Arc::new(DownloadTool::new(
            s.browser.clone(),
            dir.path(),
            5_000,
        ))),
    );

    let mut crew = Crew::new();
    let fill = crew
        .add_task("Fill the company field with Acme", s.filler.clone(), None)
        .unwrap();
    crew.add_task("Download the quote", downloader, Some(fill))
        .unwrap();

    let outcomes = crew.run().await.unwrap();
    let data = outcomes[1].output.data.clone().unwrap();
    let path = std::path::PathBuf::from(data["path"].as_str().unwrap());
    let name = path.file_name().unwrap().to_string_lossy().to_string();

    assert!(name.starts_with("orcamento_"));
    assert!(name.ends_with(".pdf"));
    // orcamento_YYYYMMDD_HHMMSS.pdf
    assert_eq!(name.len(), "orcamento_20240101_120000.pdf".len());
    assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.7 test");
}

// ── construction ─────────────────────────────────────────────────────────────

#[test]
fn test_dependencies_must_point_backwards() {
    let s = setup(RecordingBrowser::new());
    let mut crew = Crew::new();

    let self_dep = crew.add_task("Open the pricing system", s.navigator.clone(), Some(0));
    assert!(matches!(self_dep, Err(CrewError::InvalidDependency(_))));

    crew.add_task("Open the pricing system", s.navigator.clone(), None)
        .unwrap();
    let forward = crew.add_task("Add a service", s.filler.clone(), Some(2));
    assert!(matches!(forward, Err(CrewError::InvalidDependency(_))));
    assert_eq!(crew.tasks().len(), 1);
}
