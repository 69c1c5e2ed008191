use crate::browser::BrowserDriver;
use crate::config::schema::BrowserConfig;
use crate::error::{CrewError, Result};
use async_trait::async_trait;
use base64::Engine;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex};
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, WsMessage>;
type PendingMap = Arc<parking_lot::Mutex<HashMap<u64, oneshot::Sender<Value>>>>;

const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);
const LAUNCH_RETRIES: u32 = 30;
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Chrome driven over the DevTools Protocol on a raw WebSocket.
pub struct CdpBrowser {
    ws_tx: Mutex<Option<WsSink>>,
    responses: PendingMap,
    msg_id: AtomicU64,
    chrome: parking_lot::Mutex<Option<Child>>,
    /// Profile directory created for this run, removed on close
    temp_profile: Option<PathBuf>,
    navigation_timeout_ms: u64,
    action_timeout_ms: u64,
}

/// Quote a Rust string as a JavaScript string literal.
fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

/// Ready-state expression. While the page that carried `marker` is still loaded
/// it evaluates to `stale` instead of its ready state.
fn ready_state_expression(marker: Option<&str>) -> String {
    match marker {
        Some(marker) => format!(
            "window.__quotecrewDocument === {} ? 'stale' : document.readyState",
            js_string(marker)
        ),
        None => "document.readyState".to_string(),
    }
}

fn eval_value(response: &Value) -> Option<&Value> {
    response.get("result")?.get("result")?.get("value")
}

impl CdpBrowser {
    /// Launch Chrome with remote debugging enabled and attach to its page target.
    pub async fn launch(config: &BrowserConfig) -> Result<Self> {
        let (profile_dir, temp_profile) = match &config.user_data_dir {
            Some(dir) => (dir.clone(), None),
            None => {
                let dir = std::env::temp_dir()
                    .join(format!("quotecrew-profile-{}", uuid::Uuid::new_v4()));
                (dir.clone(), Some(dir))
            }
        };

        let mut cmd = Command::new(&config.chrome_path);
        cmd.arg(format!("--user-data-dir={}", profile_dir.display()));
        cmd.arg(format!("--remote-debugging-port={}", config.cdp_port));
        if config.headless {
            cmd.arg("--headless=new");
            cmd.arg("--disable-gpu");
        }
        cmd.arg("--no-first-run");
        cmd.arg("--no-default-browser-check");
        cmd.arg("--disable-background-networking");
        cmd.arg("--disable-sync");
        cmd.arg(format!("--lang={}", config.lang));
        for arg in &config.custom_args {
            cmd.arg(arg);
        }
        cmd.arg("about:blank");

        let child = cmd.spawn().map_err(|e| {
            CrewError::Browser(format!(
                "Failed to launch Chrome at {:?}: {}",
                config.chrome_path, e
            ))
        })?;
        tracing::info!(
            "Launched Chrome (pid {}) on CDP port {}",
            child.id(),
            config.cdp_port
        );

        let browser = Self {
            ws_tx: Mutex::new(None),
            responses: Arc::new(parking_lot::Mutex::new(HashMap::new())),
            msg_id: AtomicU64::new(1),
            chrome: parking_lot::Mutex::new(Some(child)),
            temp_profile,
            navigation_timeout_ms: config.navigation_timeout_ms,
            action_timeout_ms: config.action_timeout_ms,
        };

        let ws_url = wait_for_page_target(config.cdp_port).await?;
        browser.connect(&ws_url).await?;

        browser.send_command("Page.enable", json!({})).await?;
        browser.send_command("Runtime.enable", json!({})).await?;
        tracing::info!("CDP domains enabled");

        Ok(browser)
    }

    async fn connect(&self, ws_url: &str) -> Result<()> {
        tracing::info!("Connecting to page target WebSocket: {}", ws_url);
        let (ws_stream, _) = connect_async(ws_url)
            .await
            .map_err(|e| CrewError::Browser(format!("Failed to connect WebSocket: {}", e)))?;
        let (tx, mut rx) = ws_stream.split();
        *self.ws_tx.lock().await = Some(tx);

        let responses = self.responses.clone();
        tokio::spawn(async move {
            while let Some(msg) = rx.next().await {
                match msg {
                    Ok(WsMessage::Text(text)) => {
                        let Ok(json) = serde_json::from_str::<Value>(&text) else {
                            continue;
                        };
                        // Events carry no id
                        if let Some(id) = json.get("id").and_then(Value::as_u64) {
                            if let Some(sender) = responses.lock().remove(&id) {
                                let _ = sender.send(json);
                            }
                        } else {
                            tracing::trace!(
                                "CDP event: {}",
                                text.chars().take(100).collect::<String>()
                            );
                        }
                    }
                    Ok(WsMessage::Close(_)) => {
                        tracing::debug!("WebSocket closed");
                        break;
                    }
                    Err(e) => {
                        tracing::debug!("WebSocket error: {:?}", e);
                        break;
                    }
                    _ => {}
                }
            }
            // Wake every waiter instead of letting it hit the timeout
            responses.lock().clear();
        });

        Ok(())
    }

    /// Send a CDP command and wait for its response.
    async fn send_command(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.msg_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.responses.lock().insert(id, tx);

        let command = json!({ "id": id, "method": method, "params": params });
        {
            let mut guard = self.ws_tx.lock().await;
            let sink = guard
                .as_mut()
                .ok_or_else(|| CrewError::Browser("WebSocket not connected".to_string()))?;
            sink.send(WsMessage::Text(command.to_string()))
                .await
                .map_err(|e| CrewError::Browser(format!("Failed to send {}: {}", method, e)))?;
        }

        let response = match tokio::time::timeout(COMMAND_TIMEOUT, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => {
                return Err(CrewError::Browser(format!(
                    "{}: response channel closed",
                    method
                )))
            }
            Err(_) => {
                self.responses.lock().remove(&id);
                return Err(CrewError::Browser(format!("{}: command timeout", method)));
            }
        };

        if let Some(error) = response.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return Err(CrewError::Browser(format!("{} failed: {}", method, message)));
        }

        Ok(response)
    }

    /// Evaluate an expression and return its JSON value.
    async fn evaluate(&self, expression: &str) -> Result<Value> {
        let response = self
            .send_command(
                "Runtime.evaluate",
                json!({ "expression": expression, "returnByValue": true }),
            )
            .await?;

        if let Some(details) = response
            .get("result")
            .and_then(|r| r.get("exceptionDetails"))
        {
            let text = details
                .get("exception")
                .and_then(|e| e.get("description"))
                .or_else(|| details.get("text"))
                .and_then(Value::as_str)
                .unwrap_or("script exception");
            return Err(CrewError::Browser(text.to_string()));
        }

        Ok(eval_value(&response).cloned().unwrap_or(Value::Null))
    }

    async fn wait_until_loaded(&self, marker: Option<&str>) -> Result<()> {
        let timeout = Duration::from_millis(self.navigation_timeout_ms);
        let expression = ready_state_expression(marker);
        let start = Instant::now();
        loop {
            // The old document can vanish mid-evaluation
            let state = match self.evaluate(&expression).await {
                Ok(state) => state,
                Err(e) if start.elapsed() <= timeout => {
                    tracing::debug!("readyState check failed: {}", e);
                    Value::Null
                }
                Err(e) => return Err(e),
            };
            if state.as_str() == Some("complete") {
                return Ok(());
            }
            if start.elapsed() > timeout {
                return Err(CrewError::Browser(format!(
                    "Page did not finish loading within {} ms",
                    self.navigation_timeout_ms
                )));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    fn kill_chrome(&self) {
        if let Some(mut child) = self.chrome.lock().take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Poll `/json/list` until Chrome exposes a page target.
async fn wait_for_page_target(port: u16) -> Result<String> {
    let list_url = format!("http://localhost:{}/json/list", port);
    let mut last_error = String::new();

    for retry in 1..=LAUNCH_RETRIES {
        tokio::time::sleep(Duration::from_millis(500)).await;

        match find_page_target(&list_url).await {
            Ok(ws_url) => return Ok(ws_url),
            Err(e) => last_error = e,
        }
        tracing::debug!("Retry {}/{}: {}", retry, LAUNCH_RETRIES, last_error);
    }

    Err(CrewError::Browser(format!(
        "Failed to connect to Chrome after {} retries: {}",
        LAUNCH_RETRIES, last_error
    )))
}

async fn find_page_target(list_url: &str) -> std::result::Result<String, String> {
    let response = reqwest::get(list_url)
        .await
        .map_err(|e| format!("Connection error: {}", e))?;
    if !response.status().is_success() {
        return Err(format!("HTTP error: {}", response.status()));
    }
    let targets: Value = response
        .json()
        .await
        .map_err(|e| format!("Failed to parse targets response: {}", e))?;

    page_ws_url(&targets).ok_or_else(|| "No page target found".to_string())
}

fn page_ws_url(targets: &Value) -> Option<String> {
    targets
        .as_array()?
        .iter()
        .find(|t| t.get("type").and_then(Value::as_str) == Some("page"))?
        .get("webSocketDebuggerUrl")
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[async_trait]
impl BrowserDriver for CdpBrowser {
    async fn navigate(&self, url: &str) -> Result<()> {
        // Tag the outgoing document so its `complete` state is not mistaken
        // for the new page's
        let marker = uuid::Uuid::new_v4().to_string();
        if let Err(e) = self
            .evaluate(&format!("window.__quotecrewDocument = {}", js_string(&marker)))
            .await
        {
            tracing::debug!("Could not tag current document: {}", e);
        }

        let response = self
            .send_command("Page.navigate", json!({ "url": url }))
            .await?;
        if let Some(error) = response
            .get("result")
            .and_then(|r| r.get("errorText"))
            .and_then(Value::as_str)
        {
            return Err(CrewError::Browser(format!(
                "Navigation to {} failed: {}",
                url, error
            )));
        }
        // Same-document navigations (fragment changes) carry no loaderId
        let new_document = response
            .get("result")
            .and_then(|r| r.get("loaderId"))
            .is_some();
        self.wait_until_loaded(new_document.then_some(marker.as_str()))
            .await?;
        tracing::info!("Navigated to: {}", url);
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        let value = self.evaluate("window.location.href").await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn title(&self) -> Result<Option<String>> {
        let value = self.evaluate("document.title").await?;
        Ok(value
            .as_str()
            .filter(|t| !t.is_empty())
            .map(str::to_string))
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<()> {
        self.wait_for(selector, self.action_timeout_ms).await?;
        let expression = format!(
            "(function() {{ const el = document.querySelector({}); if (!el) return false; \
             el.focus(); el.value = {}; \
             el.dispatchEvent(new Event('input', {{bubbles: true}})); \
             el.dispatchEvent(new Event('change', {{bubbles: true}})); return true; }})()",
            js_string(selector),
            js_string(value)
        );

        if self.evaluate(&expression).await?.as_bool() == Some(true) {
            tracing::debug!("Filled '{}' into element: {}", value, selector);
            Ok(())
        } else {
            Err(CrewError::Browser(format!("Element not found: {}", selector)))
        }
    }

    async fn click(&self, selector: &str) -> Result<()> {
        self.wait_for(selector, self.action_timeout_ms).await?;
        let expression = format!(
            "(function() {{ const el = document.querySelector({}); \
             if (el) {{ el.scrollIntoView({{block: 'center'}}); el.click(); return true; }} \
             return false; }})()",
            js_string(selector)
        );

        if self.evaluate(&expression).await?.as_bool() == Some(true) {
            tracing::debug!("Clicked element: {}", selector);
            Ok(())
        } else {
            Err(CrewError::Browser(format!("Element not found: {}", selector)))
        }
    }

    async fn select_option(&self, selector: &str, label: &str) -> Result<()> {
        self.wait_for(selector, self.action_timeout_ms).await?;
        let expression = format!(
            "(function() {{ const el = document.querySelector({sel}); if (!el) return 'no-element'; \
             const want = {label}; \
             const opt = Array.from(el.options || []).find(o => o.text.trim() === want || o.value === want); \
             if (!opt) return 'no-option'; \
             el.value = opt.value; \
             el.dispatchEvent(new Event('change', {{bubbles: true}})); return 'ok'; }})()",
            sel = js_string(selector),
            label = js_string(label)
        );

        match self.evaluate(&expression).await?.as_str() {
            Some("ok") => {
                tracing::debug!("Selected '{}' in element: {}", label, selector);
                Ok(())
            }
            Some("no-option") => Err(CrewError::Browser(format!(
                "Option '{}' not found in {}",
                label, selector
            ))),
            _ => Err(CrewError::Browser(format!("Element not found: {}", selector))),
        }
    }

    async fn wait_for(&self, selector: &str, timeout_ms: u64) -> Result<()> {
        let timeout = Duration::from_millis(timeout_ms);
        let start = Instant::now();
        let expression = format!("!!document.querySelector({})", js_string(selector));

        loop {
            if self.evaluate(&expression).await?.as_bool() == Some(true) {
                tracing::debug!("Element found: {}", selector);
                return Ok(());
            }
            if start.elapsed() > timeout {
                return Err(CrewError::Browser(format!(
                    "Timeout waiting for element: {}",
                    selector
                )));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn set_download_dir(&self, dir: &Path) -> Result<()> {
        let path = dir.to_string_lossy().to_string();
        let params = json!({ "behavior": "allow", "downloadPath": path });

        // Older Chrome builds only accept the Page-domain variant on page targets
        if let Err(e) = self
            .send_command("Browser.setDownloadBehavior", params.clone())
            .await
        {
            tracing::debug!("{}, retrying with Page.setDownloadBehavior", e);
            self.send_command("Page.setDownloadBehavior", params).await?;
        }
        tracing::info!("Downloads routed to {:?}", dir);
        Ok(())
    }

    async fn print_pdf(&self) -> Result<Vec<u8>> {
        let response = self
            .send_command("Page.printToPDF", json!({ "printBackground": true }))
            .await?;
        let data = response
            .get("result")
            .and_then(|r| r.get("data"))
            .and_then(Value::as_str)
            .ok_or_else(|| CrewError::Browser("printToPDF returned no data".to_string()))?;

        base64::engine::general_purpose::STANDARD
            .decode(data)
            .map_err(|e| CrewError::Browser(format!("Invalid PDF payload: {}", e)))
    }

    async fn close(&self) -> Result<()> {
        if let Some(mut sink) = self.ws_tx.lock().await.take() {
            let _ = sink.close().await;
        }
        self.kill_chrome();
        if let Some(dir) = &self.temp_profile {
            if let Err(e) = std::fs::remove_dir_all(dir) {
                tracing::debug!("Could not remove profile dir {:?}: {}", dir, e);
            }
        }
        tracing::info!("Browser closed");
        Ok(())
    }
}

impl Drop for CdpBrowser {
    fn drop(&mut self) {
        self.kill_chrome();
    }
}
