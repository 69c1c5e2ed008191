use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Browser launch settings
    #[serde(default)]
    pub browser: BrowserConfig,

    /// LLM providers and routing
    #[serde(default)]
    pub llm: LlmConfig,

    /// Contextual memory limits
    #[serde(default)]
    pub memory: MemoryConfig,

    /// The pricing form to fill
    #[serde(default)]
    pub form: FormConfig,

    /// Where the quote PDF ends up
    #[serde(default)]
    pub output: OutputConfig,
}

// ==================== Browser ====================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Chrome executable path
    #[serde(default = "default_chrome_path")]
    pub chrome_path: PathBuf,

    /// Run without a visible window
    #[serde(default = "default_true")]
    pub headless: bool,

    /// Remote debugging port
    #[serde(default = "default_cdp_port")]
    pub cdp_port: u16,

    /// User data directory (a fresh temp dir is used when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_data_dir: Option<PathBuf>,

    /// Language
    #[serde(default = "default_lang")]
    pub lang: String,

    /// Page load timeout for navigation
    #[serde(default = "default_navigation_timeout")]
    pub navigation_timeout_ms: u64,

    /// Timeout for locating an element before fill/click
    #[serde(default = "default_action_timeout")]
    pub action_timeout_ms: u64,

    /// Custom launch arguments
    #[serde(default)]
    pub custom_args: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            chrome_path: default_chrome_path(),
            headless: true,
            cdp_port: default_cdp_port(),
            user_data_dir: None,
            lang: default_lang(),
            navigation_timeout_ms: default_navigation_timeout(),
            action_timeout_ms: default_action_timeout(),
            custom_args: Vec::new(),
        }
    }
}

/// Get default Chrome path based on platform
fn default_chrome_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        PathBuf::from("C:\\Program Files\\Google\\Chrome\\Application\\chrome.exe")
    }
    #[cfg(target_os = "macos")]
    {
        PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome")
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        PathBuf::from("/usr/bin/google-chrome")
    }
}

fn default_cdp_port() -> u16 {
    9222
}

fn default_lang() -> String {
    "pt-BR".to_string()
}

fn default_navigation_timeout() -> u64 {
    90_000
}

fn default_action_timeout() -> u64 {
    30_000
}

fn default_true() -> bool {
    true
}

// ==================== LLM ====================

/// API type for the provider
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ApiType {
    /// OpenAI-compatible chat completions (OpenAI, Groq, OpenRouter, Mistral, DashScope)
    #[default]
    Openai,
    Anthropic,
    Gemini,
}

/// How the manager picks the client asked first
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Routing {
    /// Always start with the first configured provider
    #[default]
    Priority,
    /// Rotate the starting provider on every call
    RoundRobin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider id (e.g. "gemini", "groq")
    pub id: String,
    /// API type (determines request format)
    #[serde(default)]
    pub api_type: ApiType,
    /// Base URL for the API
    pub base_url: String,
    /// API key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Model name
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    1024
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub routing: Routing,

    /// Clients tried after the preferred one before giving up
    #[serde(default = "default_fallback_limit")]
    pub fallback_limit: usize,

    /// Per-request timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_seconds: u64,

    /// Token budget for one decision prompt; derived from the models'
    /// context windows when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_max_tokens: Option<usize>,

    /// Providers in preference order
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            routing: Routing::default(),
            fallback_limit: default_fallback_limit(),
            timeout_seconds: default_llm_timeout(),
            prompt_max_tokens: None,
            providers: Vec::new(),
        }
    }
}

fn default_fallback_limit() -> usize {
    1
}

fn default_llm_timeout() -> u64 {
    60
}

/// Providers discoverable from the environment: (id, key var, model var, default model, api type, base url).
pub const ENV_PROVIDERS: &[(&str, &str, &str, &str, ApiType, &str)] = &[
    (
        "gemini",
        "GEMINI_API_KEY",
        "GEMINI_MODEL",
        "gemini-1.5-flash",
        ApiType::Gemini,
        "https://generativelanguage.googleapis.com/v1beta",
    ),
    (
        "openai",
        "OPENAI_API_KEY",
        "OPENAI_MODEL",
        "gpt-3.5-turbo",
        ApiType::Openai,
        "https://api.openai.com/v1",
    ),
    (
        "groq",
        "GROQ_API_KEY",
        "GROQ_MODEL",
        "llama3-8b-8192",
        ApiType::Openai,
        "https://api.groq.com/openai/v1",
    ),
    (
        "anthropic",
        "ANTHROPIC_API_KEY",
        "ANTHROPIC_MODEL",
        "claude-3-haiku-20240307",
        ApiType::Anthropic,
        "https://api.anthropic.com",
    ),
    (
        "mistral",
        "MISTRAL_API_KEY",
        "MISTRAL_MODEL",
        "mistral-large-latest",
        ApiType::Openai,
        "https://api.mistral.ai/v1",
    ),
    (
        "openrouter",
        "OPENROUTER_API_KEY",
        "OPENROUTER_MODEL",
        "openrouter/auto",
        ApiType::Openai,
        "https://openrouter.ai/api/v1",
    ),
    (
        "qwen",
        "DASHSCOPE_API_KEY",
        "QWEN_MODEL",
        "qwen-turbo",
        ApiType::Openai,
        "https://dashscope-intl.aliyuncs.com/compatible-mode/v1",
    ),
];

impl LlmConfig {
    /// Append providers whose API key is present in `lookup` and which the
    /// file does not already configure. Keys missing from file entries are
    /// filled in from `lookup` as well.
    pub fn merge_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for (id, key_var, model_var, default_model, api_type, base_url) in ENV_PROVIDERS {
            let key = lookup(key_var).filter(|k| !k.trim().is_empty());

            if let Some(existing) = self.providers.iter_mut().find(|p| p.id == *id) {
                if existing.api_key.is_none() {
                    existing.api_key = key;
                }
                continue;
            }

            match key {
                Some(api_key) => {
                    let model = lookup(model_var).unwrap_or_else(|| default_model.to_string());
                    tracing::info!("Using {} from environment (model {})", id, model);
                    self.providers.push(ProviderConfig {
                        id: id.to_string(),
                        api_type: *api_type,
                        base_url: base_url.to_string(),
                        api_key: Some(api_key),
                        model,
                        temperature: default_temperature(),
                        max_tokens: default_max_tokens(),
                    });
                }
                None => tracing::debug!("{} not set, skipping {}", key_var, id),
            }
        }
    }
}

// ==================== Memory ====================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Soft cap on stored entries
    #[serde(default = "default_max_items")]
    pub max_items: usize,

    /// Entries kept verbatim when older ones are summarized
    #[serde(default = "default_keep_recent")]
    pub keep_recent: usize,

    /// Estimated token budget for all entries
    #[serde(default = "default_memory_tokens")]
    pub max_tokens: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_items: default_max_items(),
            keep_recent: default_keep_recent(),
            max_tokens: default_memory_tokens(),
        }
    }
}

fn default_max_items() -> usize {
    20
}

fn default_keep_recent() -> usize {
    5
}

fn default_memory_tokens() -> usize {
    8000
}

// ==================== Form ====================

/// One interaction with the pricing form, in page order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FormStep {
    Fill {
        label: String,
        selector: String,
        value: String,
    },
    Click {
        label: String,
        selector: String,
    },
    Select {
        label: String,
        selector: String,
        option: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormConfig {
    /// Pricing system URL
    #[serde(default = "default_form_url")]
    pub url: String,

    #[serde(default = "default_form_steps")]
    pub steps: Vec<FormStep>,

    /// Button that generates the quote PDF. An empty string prints the page itself.
    #[serde(
        default = "default_download_selector",
        serialize_with = "serialize_selector",
        deserialize_with = "deserialize_selector"
    )]
    pub download_selector: Option<String>,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            url: default_form_url(),
            steps: default_form_steps(),
            download_selector: default_download_selector(),
        }
    }
}

fn default_download_selector() -> Option<String> {
    Some("#gerar-pdf".to_string())
}

// TOML has no null, so "no selector" is written as ""
fn serialize_selector<S>(selector: &Option<String>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(selector.as_deref().unwrap_or(""))
}

fn deserialize_selector<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let trimmed = raw.trim();
    Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
}

fn default_form_url() -> String {
    "https://precificacao-sistema.onrender.com/".to_string()
}

fn default_form_steps() -> Vec<FormStep> {
    vec![
        FormStep::Fill {
            label: "company".to_string(),
            selector: "#empresa".to_string(),
            value: "Acme".to_string(),
        },
        FormStep::Click {
            label: "add service".to_string(),
            selector: "#add-service".to_string(),
        },
    ]
}

// ==================== Output ====================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory the quote PDF is written to
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    /// How long to wait for the browser download to finish
    #[serde(default = "default_download_timeout")]
    pub download_timeout_ms: u64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            download_timeout_ms: default_download_timeout(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("orcamentos")
}

fn default_download_timeout() -> u64 {
    60_000
}
