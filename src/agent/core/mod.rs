// Module declarations
mod agent;
mod browser_state;
mod config;
mod llm_integration;
mod messaging;
mod processor;
mod route;

pub use agent::Agent;
pub use config::{AgentConfig, PromptConfig};
