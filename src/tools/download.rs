use crate::browser::BrowserDriver;
use crate::error::{CrewError, Result};
use crate::tools::{Tool, ToolCall, ToolOutput};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// `orcamento_YYYYMMDD_HHMMSS.pdf`
pub fn quote_file_name(now: DateTime<Local>) -> String {
    format!("orcamento_{}.pdf", now.format("%Y%m%d_%H%M%S"))
}

/// Saves the quote PDF into the output directory, either by clicking the
/// page's download button or by printing the page.
pub struct DownloadTool {
    browser: Arc<dyn BrowserDriver>,
    output_dir: PathBuf,
    default_timeout_ms: u64,
}

impl DownloadTool {
    pub fn new(
        browser: Arc<dyn BrowserDriver>,
        output_dir: impl Into<PathBuf>,
        default_timeout_ms: u64,
    ) -> Self {
        Self {
            browser,
            output_dir: output_dir.into(),
            default_timeout_ms,
        }
    }

    /// Target path that does not overwrite an earlier quote from the same second.
    fn target_path(&self) -> PathBuf {
        let name = quote_file_name(Local::now());
        let mut path = self.output_dir.join(&name);
        let stem = name.trim_end_matches(".pdf").to_string();
        let mut n = 1;
        while path.exists() {
            path = self.output_dir.join(format!("{}_{}.pdf", stem, n));
            n += 1;
        }
        path
    }

    async fn download_via_click(&self, selector: &str, timeout_ms: u64) -> Result<PathBuf> {
        let staging = self
            .output_dir
            .join(format!(".staging-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&staging).await?;

        match self.fetch_into(&staging, selector, timeout_ms).await {
            Ok(file) => move_out_of_staging(&staging, &file, self.target_path()).await,
            Err(e) => {
                remove_staging(&staging).await;
                Err(e)
            }
        }
    }

    async fn fetch_into(&self, staging: &Path, selector: &str, timeout_ms: u64) -> Result<PathBuf> {
        self.browser
            .set_download_dir(staging)
            .await
            .map_err(|e| CrewError::tool("download_pdf", e.to_string()))?;
        self.browser
            .click(selector)
            .await
            .map_err(|e| CrewError::tool("download_pdf", e.to_string()))?;

        tracing::info!("Waiting up to {} ms for the download", timeout_ms);
        wait_for_download(staging, Duration::from_millis(timeout_ms)).await
    }

    async fn download_via_print(&self) -> Result<PathBuf> {
        let bytes = self
            .browser
            .print_pdf()
            .await
            .map_err(|e| CrewError::tool("download_pdf", e.to_string()))?;
        let target = self.target_path();
        tokio::fs::write(&target, bytes).await?;
        Ok(target)
    }
}

/// Move the finished download to `target` and drop the staging dir, also
/// when the move fails.
async fn move_out_of_staging(staging: &Path, file: &Path, target: PathBuf) -> Result<PathBuf> {
    let moved = tokio::fs::rename(file, &target).await;
    remove_staging(staging).await;
    moved?;
    Ok(target)
}

async fn remove_staging(staging: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(staging).await {
        tracing::debug!("Could not remove staging dir {:?}: {}", staging, e);
    }
}

/// Poll `dir` until a finished, non-empty file shows up.
async fn wait_for_download(dir: &Path, timeout: Duration) -> Result<PathBuf> {
    let start = Instant::now();
    loop {
        if let Some(file) = finished_file(dir).await? {
            return Ok(file);
        }
        if start.elapsed() > timeout {
            return Err(CrewError::tool(
                "download_pdf",
                format!("no download finished within {} ms", timeout.as_millis()),
            ));
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

async fn finished_file(dir: &Path) -> Result<Option<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let partial = path
            .extension()
            .is_some_and(|ext| ext == "crdownload" || ext == "tmp");
        if partial {
            continue;
        }
        let metadata = entry.metadata().await?;
        if metadata.is_file() && metadata.len() > 0 {
            return Ok(Some(path));
        }
    }
    Ok(None)
}

#[async_trait]
impl Tool for DownloadTool {
    fn name(&self) -> &str {
        "downloader"
    }

    fn handles(&self) -> &'static [&'static str] {
        &["download_pdf"]
    }

    async fn invoke(&self, call: &ToolCall) -> Result<ToolOutput> {
        let ToolCall::DownloadPdf(p) = call else {
            return Err(CrewError::tool(
                self.name(),
                format!("cannot execute '{}'", call.name()),
            ));
        };

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = match &p.selector {
            Some(selector) => {
                let timeout_ms = p.timeout_ms.unwrap_or(self.default_timeout_ms);
                self.download_via_click(selector, timeout_ms).await?
            }
            None => self.download_via_print().await?,
        };

        let bytes = tokio::fs::metadata(&path).await?.len();
        let mut head = [0u8; 4];
        if let Ok(mut file) = tokio::fs::File::open(&path).await {
            use tokio::io::AsyncReadExt;
            let _ = file.read_exact(&mut head).await;
        }
        if &head != b"%PDF" {
            tracing::warn!("{:?} does not look like a PDF", path);
        }

        tracing::info!("Quote saved to {:?} ({} bytes)", path, bytes);
        Ok(
            ToolOutput::new(format!("Saved quote PDF to {}", path.display()))
                .with_data(json!({ "path": path, "bytes": bytes })),
        )
    }
}
