use crate::browser::BrowserDriver;
use crate::error::{CrewError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};

/// In-memory browser that logs every call.
pub struct FakeBrowser {
    calls: Mutex<Vec<String>>,
    download_dir: Mutex<Option<PathBuf>>,
    missing: Option<String>,
    downloads: bool,
    location: Mutex<String>,
    redirect: Option<String>,
    page_errors: bool,
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            download_dir: Mutex::new(None),
            missing: None,
            downloads: true,
            location: Mutex::new("about:blank".to_string()),
            redirect: None,
            page_errors: false,
        }
    }

    /// Every navigation lands on `url`.
    pub fn redirecting_to(mut self, url: &str) -> Self {
        self.redirect = Some(url.to_string());
        self
    }

    /// Page queries (URL and title) fail after navigation.
    pub fn with_page_errors(mut self) -> Self {
        self.page_errors = true;
        self
    }

    /// Every interaction with `selector` fails as if the element were absent.
    pub fn missing(mut self, selector: &str) -> Self {
        self.missing = Some(selector.to_string());
        self
    }

    /// Clicks never produce a downloaded file.
    pub fn without_download(mut self) -> Self {
        self.downloads = false;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn log(&self, call: String) {
        self.calls.lock().push(call);
    }

    fn check(&self, selector: &str) -> Result<()> {
        if self.missing.as_deref() == Some(selector) {
            return Err(CrewError::Browser(format!("Element not found: {}", selector)));
        }
        Ok(())
    }
}

#[async_trait]
impl BrowserDriver for FakeBrowser {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.log(format!("navigate {}", url));
        *self.location.lock() = self.redirect.clone().unwrap_or_else(|| url.to_string());
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        if self.page_errors {
            return Err(CrewError::Browser("Runtime.evaluate timed out".to_string()));
        }
        Ok(self.location.lock().clone())
    }

    async fn title(&self) -> Result<Option<String>> {
        if self.page_errors {
            return Err(CrewError::Browser("Runtime.evaluate timed out".to_string()));
        }
        Ok(Some("Sistema de Precificação".to_string()))
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<()> {
        self.check(selector)?;
        self.log(format!("fill {}={}", selector, value));
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<()> {
        self.check(selector)?;
        self.log(format!("click {}", selector));
        if self.downloads {
            if let Some(dir) = self.download_dir.lock().clone() {
                std::fs::write(dir.join("orcamento.pdf"), b"%PDF-1.4 fake")?;
            }
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
        self.log("set_download_dir".to_string());
        *self.download_dir.lock() = Some(dir.to_path_buf());
        Ok(())
    }

    async fn print_pdf(&self) -> Result<Vec<u8>> {
        self.log("print_pdf".to_string());
        Ok(b"%PDF-1.4 printed".to_vec())
    }

    async fn close(&self) -> Result<()> {
        self.log("close".to_string());
        Ok(())
    }
}
