use thiserror::Error;

#[derive(Error, Debug)]
pub enum CrewError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDeserialize(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Every attempted LLM provider failed (or none is configured).
    #[error("All LLM clients failed: {}", format_attempts(.attempts))]
    LlmExhausted { attempts: Vec<(String, String)> },

    #[error("Could not parse tool directive: {0}")]
    Parse(String),

    #[error("Unknown task: {0}")]
    UnknownTask(String),

    #[error("Unknown tool '{name}'; available: {}", .available.join(", "))]
    UnknownTool { name: String, available: Vec<String> },

    #[error("Agent '{0}' runs in LLM mode but has no LLM manager")]
    MissingLlm(String),

    #[error("Tool '{tool}' failed: {message}")]
    Tool { tool: String, message: String },

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Invalid dependency: {0}")]
    InvalidDependency(String),

    #[error("Task {0} already has a result")]
    AlreadyCompleted(usize),

    #[error("Crew has already run")]
    AlreadyRun,

    #[error("Task {index} ('{description}') failed: {source}")]
    TaskFailed {
        index: usize,
        description: String,
        #[source]
        source: Box<CrewError>,
    },
}

fn format_attempts(attempts: &[(String, String)]) -> String {
    if attempts.is_empty() {
        return "no clients configured".to_string();
    }
    attempts
        .iter()
        .map(|(provider, error)| format!("{}: {}", provider, error))
        .collect::<Vec<_>>()
        .join("; ")
}

impl CrewError {
    pub fn tool(tool: &str, message: impl Into<String>) -> Self {
        Self::Tool {
            tool: tool.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CrewError>;
