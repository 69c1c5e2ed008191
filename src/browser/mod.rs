pub mod cdp;
#[cfg(test)]
pub(crate) mod testing;

pub use cdp::CdpBrowser;

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Page-level operations the tools need from a browser.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Load `url` and wait until the document is ready
    async fn navigate(&self, url: &str) -> Result<()>;

    async fn current_url(&self) -> Result<String>;

    async fn title(&self) -> Result<Option<String>>;

    /// Set an input's value and fire its input/change events
    async fn fill(&self, selector: &str, value: &str) -> Result<()>;

    async fn click(&self, selector: &str) -> Result<()>;

    /// Pick the `<option>` whose visible text (or value) is `label`
    async fn select_option(&self, selector: &str, label: &str) -> Result<()>;

    async fn wait_for(&self, selector: &str, timeout_ms: u64) -> Result<()>;

    /// Route downloads triggered by the page into `dir`
    async fn set_download_dir(&self, dir: &Path) -> Result<()>;

    /// Render the current page as PDF bytes
    async fn print_pdf(&self) -> Result<Vec<u8>>;

    async fn close(&self) -> Result<()>;
}
