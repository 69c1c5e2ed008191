pub mod agent;
pub mod browser;
pub mod cli;
pub mod config;
pub mod crew;
pub mod error;
pub mod llm;
pub mod memory;
pub mod scenario;
pub mod task;
pub mod tools;

pub use agent::{Agent, DecisionMode, DirectPlan};
pub use crew::Crew;
pub use error::{CrewError, Result};
pub use llm::LlmManager;
pub use memory::ContextualMemory;
pub use task::{Task, TaskOutcome, TaskStatus};
