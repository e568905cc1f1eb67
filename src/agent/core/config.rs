use serde::{Deserialize, Serialize};

use crate::actions::BatchPolicy;
use crate::agent::prompts::{AgentMessagePrompt, SystemPrompt};

fn default_max_turns() -> usize {
    20
}

fn default_max_exemplars() -> usize {
    3
}

fn default_llm_timeout_secs() -> u64 {
    120
}

/// Configuration parameters for agent behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Turn cap for `browse`, unless the call overrides it
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
    /// Upper bound on recalled memories placed in the prompt
    #[serde(default = "default_max_exemplars")]
    pub max_exemplars: usize,
    #[serde(default)]
    pub batch_policy: BatchPolicy,
    /// Limit for a single model attempt
    #[serde(default = "default_llm_timeout_secs")]
    pub llm_timeout_secs: u64,
    #[serde(default)]
    pub extra_instructions: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            max_exemplars: default_max_exemplars(),
            batch_policy: BatchPolicy::default(),
            llm_timeout_secs: default_llm_timeout_secs(),
            extra_instructions: None,
        }
    }
}

/// Prompt configuration for agent
#[derive(Debug, Clone, Default)]
pub struct PromptConfig {
    pub system_prompt: SystemPrompt,
    pub agent_prompt: AgentMessagePrompt,
}

impl PromptConfig {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            system_prompt: SystemPrompt::new(config.extra_instructions.clone()),
            agent_prompt: AgentMessagePrompt::new(),
        }
    }
}
