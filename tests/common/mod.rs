//! Shared fakes for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use quotecrew_lib::browser::BrowserDriver;
use quotecrew_lib::config::Routing;
use quotecrew_lib::llm::{LlmManager, LlmMessage, LlmProvider, LlmResponse, ProviderError, TokenUsage};
use quotecrew_lib::{CrewError, Result};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ── browser ──────────────────────────────────────────────────────────────────

/// Browser double that logs each call as a short string.
#[derive(Default)]
pub struct RecordingBrowser {
    calls: Mutex<Vec<String>>,
    download_dir: Mutex<Option<PathBuf>>,
    missing: Vec<String>,
}

impl RecordingBrowser {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_missing(selectors: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            missing: selectors.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn log(&self, call: String) {
        self.calls.lock().push(call);
    }

    fn check(&self, selector: &str) -> Result<()> {
        if self.missing.iter().any(|s| s == selector) {
            return Err(CrewError::Browser(format!("Element not found: {}", selector)));
        }
        Ok(())
    }
}

#[async_trait]
impl BrowserDriver for RecordingBrowser {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.log(format!("navigate {}", url));
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(String::new())
    }

    async fn title(&self) -> Result<Option<String>> {
        Ok(None)
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<()> {
        self.check(selector)?;
        self.log(format!("fill {}={}", selector, value));
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<()> {
        self.check(selector)?;
        self.log(format!("click {}", selector));
        if let Some(dir) = self.download_dir.lock().clone() {
            std::fs::write(dir.join("quote.pdf"), b"%PDF-1.7 test")?;
        }
        Ok(())
    }

    async fn select_option(&self, selector: &str, label: &str) -> Result<()> {
        self.check(selector)?;
        self.log(format!("select {}={}", selector, label));
        Ok(())
    }

    async fn wait_for(&self, selector: &str, _timeout_ms: u64) -> Result<()> {
        self.check(selector)?;
        self.log(format!("wait_for {}", selector));
        Ok(())
    }

    async fn set_download_dir(&self, dir: &Path) -> Result<()> {
        *self.download_dir.lock() = Some(dir.to_path_buf());
        Ok(())
    }

    async fn print_pdf(&self) -> Result<Vec<u8>> {
        self.log("print_pdf".to_string());
        Ok(b"%PDF-1.7 printed".to_vec())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

// ── LLM ──────────────────────────────────────────────────────────────────────

/// LLM client that replays queued replies and keeps every prompt it saw.
pub struct ScriptedLlm {
    name: String,
    replies: Mutex<VecDeque<std::result::Result<String, ProviderError>>>,
    prompts: Mutex<Vec<Vec<LlmMessage>>>,
    calls: AtomicUsize,
}

impl ScriptedLlm {
    pub fn new(name: &str, replies: Vec<std::result::Result<String, ProviderError>>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn answering(name: &str, replies: &[&str]) -> Arc<Self> {
        Self::new(name, replies.iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn failing(name: &str, error: ProviderError) -> Arc<Self> {
        Self::new(name, vec![Err(error)])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<Vec<LlmMessage>> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    async fn complete(
        &self,
        messages: &[LlmMessage],
    ) -> std::result::Result<LlmResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(messages.to_vec());
        let reply = self
            .replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::InvalidResponse("script exhausted".into())))?;
        Ok(LlmResponse {
            content: reply,
            model: "scripted".to_string(),
            usage: TokenUsage::default(),
        })
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

pub fn manager(clients: &[Arc<ScriptedLlm>]) -> Arc<LlmManager> {
    let clients: Vec<Arc<dyn LlmProvider>> = clients
        .iter()
        .map(|c| c.clone() as Arc<dyn LlmProvider>)
        .collect();
    Arc::new(LlmManager::new(clients, Routing::Priority, 1))
}
