pub mod manager;
pub mod prompt;
pub mod provider;
pub mod types;

pub use manager::LlmManager;
pub use provider::{
    build_provider, AnthropicProvider, GeminiProvider, LlmProvider, OpenAiProvider,
};
pub use types::{LlmMessage, LlmResponse, ProviderError, TokenUsage};
