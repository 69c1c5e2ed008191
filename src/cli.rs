use crate::browser::{BrowserDriver, CdpBrowser};
use crate::config::{self, AppConfig};
use crate::error::{CrewError, Result};
use crate::llm::LlmManager;
use crate::scenario::{build_crew, RunMode};
use crate::task::TaskOutcome;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Fill the pricing form and download the quote PDF.
#[derive(Debug, Parser)]
#[command(name = "quotecrew", version, about)]
pub struct Cli {
    /// Show the browser window
    #[arg(long)]
    pub no_headless: bool,

    /// How agents pick their tool calls
    #[arg(long, value_enum, default_value_t = RunMode::Direct)]
    pub mode: RunMode,

    /// Config file (created with defaults when missing)
    #[arg(long, env = "QUOTECREW_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the pricing form URL
    #[arg(long)]
    pub url: Option<String>,

    /// Override the directory the PDF is written to
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Apply command-line overrides on top of the loaded config.
    pub fn apply(&self, config: &mut AppConfig) {
        if self.no_headless {
            config.browser.headless = false;
        }
        if let Some(url) = &self.url {
            config.form.url = url.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output.dir = dir.clone();
        }
    }
}

/// `RUST_LOG` wins; otherwise `info`, or `debug` with `-v`.
pub fn init_tracing(verbose: bool) {
    let default = if verbose {
        "quotecrew=debug,quotecrew_lib=debug,info"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// The LLM manager an LLM-mode run needs. Direct runs ignore the LLM config.
fn llm_for_mode(config: &AppConfig, mode: RunMode) -> Result<Option<Arc<LlmManager>>> {
    match mode {
        RunMode::Llm => {
            config::validate_llm(&config.llm)?;
            let manager = LlmManager::from_config(&config.llm);
            if manager.is_empty() {
                return Err(CrewError::MissingLlm("navigator".to_string()));
            }
            tracing::info!("LLM clients: {}", manager.client_names().join(", "));
            Ok(Some(Arc::new(manager)))
        }
        RunMode::Direct => {
            if !config.llm.providers.is_empty() {
                tracing::debug!(
                    "Direct mode, ignoring {} LLM providers",
                    config.llm.providers.len()
                );
            }
            Ok(None)
        }
    }
}

/// Load config, launch the browser and run the crew.
pub async fn run(cli: &Cli) -> Result<Vec<TaskOutcome>> {
    let mut config = config::load_config(cli.config.as_deref())?;
    config::apply_env(&mut config);
    cli.apply(&mut config);
    config::validate_config(&config)?;
    let llm = llm_for_mode(&config, cli.mode)?;

    config::validate_chrome_path(&config.browser.chrome_path)?;
    let browser = Arc::new(CdpBrowser::launch(&config.browser).await?);

    let outcome = match build_crew(&config, cli.mode, browser.clone(), llm) {
        Ok(mut crew) => crew.run().await,
        Err(e) => Err(e),
    };

    if let Err(e) = browser.close().await {
        tracing::warn!("Failed to close browser: {}", e);
    }
    outcome
}
