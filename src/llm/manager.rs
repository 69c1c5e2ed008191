use crate::config::schema::{LlmConfig, Routing};
use crate::error::{CrewError, Result};
use crate::llm::prompt::context_window;
use crate::llm::provider::{build_provider, LlmProvider};
use crate::llm::types::{LlmMessage, LlmResponse, ProviderError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Routes prompts to configured LLM clients with a single fallback pass.
///
/// The preferred client is asked first; on any failure the next clients (up to
/// `fallback_limit` of them) are tried in configuration order, wrapping around
/// the list. There is no retry or backoff.
pub struct LlmManager {
    clients: Vec<Arc<dyn LlmProvider>>,
    routing: Routing,
    fallback_limit: usize,
    prompt_budget: usize,
    cursor: AtomicUsize,
}

/// Half of the smallest context window, leaving room for the answer.
fn default_prompt_budget(clients: &[Arc<dyn LlmProvider>]) -> usize {
    clients
        .iter()
        .map(|c| context_window(c.model()))
        .min()
        .unwrap_or_else(|| context_window(""))
        / 2
}

impl LlmManager {
    pub fn new(
        clients: Vec<Arc<dyn LlmProvider>>,
        routing: Routing,
        fallback_limit: usize,
    ) -> Self {
        let prompt_budget = default_prompt_budget(&clients);
        Self {
            clients,
            routing,
            fallback_limit,
            prompt_budget,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn with_prompt_budget(mut self, max_tokens: usize) -> Self {
        self.prompt_budget = max_tokens.max(1);
        self
    }

    /// Build one client per configured provider, in preference order.
    pub fn from_config(config: &LlmConfig) -> Self {
        let clients = config
            .providers
            .iter()
            .cloned()
            .map(|provider| Arc::from(build_provider(provider, config.timeout_seconds)))
            .collect();
        let manager = Self::new(clients, config.routing, config.fallback_limit);
        match config.prompt_max_tokens {
            Some(max_tokens) => manager.with_prompt_budget(max_tokens),
            None => manager,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Estimated tokens one prompt (system plus user) may use.
    pub fn prompt_budget(&self) -> usize {
        self.prompt_budget
    }

    pub fn client_names(&self) -> Vec<String> {
        self.clients.iter().map(|c| c.name().to_string()).collect()
    }

    /// Indices of the clients one call may try, preferred first.
    fn attempt_order(&self) -> Vec<usize> {
        let n = self.clients.len();
        if n == 0 {
            return Vec::new();
        }
        let start = match self.routing {
            Routing::Priority => 0,
            Routing::RoundRobin => self.cursor.fetch_add(1, Ordering::Relaxed) % n,
        };
        let budget = n.min(self.fallback_limit.saturating_add(1));
        (0..budget).map(|offset| (start + offset) % n).collect()
    }

    /// Send a full conversation and return the first successful response.
    pub async fn chat(&self, messages: &[LlmMessage]) -> Result<LlmResponse> {
        let mut attempts = Vec::new();

        for index in self.attempt_order() {
            let client = &self.clients[index];
            tracing::debug!("Asking {} ({})", client.name(), client.model());

            let outcome = match client.complete(messages).await {
                Ok(response) if response.content.trim().is_empty() => Err(
                    ProviderError::InvalidResponse("empty response".to_string()),
                ),
                other => other,
            };

            match outcome {
                Ok(response) => {
                    tracing::info!(
                        "{} answered ({} tokens)",
                        client.name(),
                        response.usage.total_tokens
                    );
                    return Ok(response);
                }
                Err(e) => {
                    tracing::warn!("LLM client {} failed: {}", client.name(), e);
                    attempts.push((client.name().to_string(), e.to_string()));
                }
            }
        }

        Err(CrewError::LlmExhausted { attempts })
    }

    /// Ask a single user prompt and return the response text.
    pub async fn ask(&self, prompt: &str) -> Result<String> {
        let response = self.chat(&[LlmMessage::user(prompt)]).await?;
        Ok(response.content)
    }

    /// Ask with a system prompt in front of the user prompt.
    pub async fn ask_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        let response = self
            .chat(&[LlmMessage::system(system), LlmMessage::user(prompt)])
            .await?;
        Ok(response.content)
    }
}
