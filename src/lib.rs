//! Accessibility-tree browser agent
//!
//! Compresses a live page into an indexed accessibility tree, lets a language
//! model pick actions by index, executes them through chromiumoxide, and can
//! replay recorded trajectories on pages whose indices have shifted.

pub mod actions;
pub mod agent;
pub mod aria;
pub mod browser;
pub mod browser_setup;
pub mod inventory;
pub mod llm;
mod manager;
pub mod memory;
mod utils;

#[cfg(test)]
mod testing;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::agent::AgentConfig;
use crate::llm::BackoffConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub backoff: BackoffConfig,

    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub browser: BrowserConfig,
}

/// OpenAI-compatible model endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Name of the environment variable holding the API key
    #[serde(default = "default_model_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u64,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Collective memory service; no endpoint means nothing is stored or recalled
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default = "default_memory_api_key_env")]
    pub api_key_env: String,
}

/// Browser security and launch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Run browser in headless mode
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Disable web security features (Same-Origin Policy, etc.)
    /// WARNING: Only enable for trusted content
    #[serde(default = "default_disable_security")]
    pub disable_security: bool,

    /// Window dimensions
    #[serde(default)]
    pub window: WindowConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "default_window_width")]
    pub width: u32,

    #[serde(default = "default_window_height")]
    pub height: u32,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_model() -> String {
    "gpt-4o".to_string()
}
fn default_model_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_temperature() -> f64 {
    0.0
}
fn default_max_tokens() -> u64 {
    2048
}
fn default_timeout_secs() -> u64 {
    120
}

fn default_memory_api_key_env() -> String {
    "ARIA_PILOT_MEMORY_KEY".to_string()
}

fn default_headless() -> bool {
    true
}

fn default_disable_security() -> bool {
    false
}

fn default_window_width() -> u32 {
    1280
}

fn default_window_height() -> u32 {
    720
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_model_api_key_env(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key_env: default_memory_api_key_env(),
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            disable_security: default_disable_security(),
            window: WindowConfig::default(),
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: default_window_width(),
            height: default_window_height(),
        }
    }
}

/// Load config from `path`, or `config.yaml` in the working directory
///
/// A missing file yields the defaults; a malformed one is an error.
pub fn load_yaml_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config_path = path.unwrap_or_else(|| Path::new("config.yaml"));

    if config_path.exists() {
        let contents = fs::read_to_string(config_path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    } else {
        Ok(Config::default())
    }
}

pub use actions::{ActionExecutor, BatchPolicy, BrowserAction};
pub use agent::{Agent, BrowseOptions, BrowseOutput, ObjectiveOutcome, RouteOptions};
pub use browser::{
    BrowserError, BrowserPage, BrowserResult, BrowserWrapper, CdpPage, download_managed_browser,
    find_browser_executable, launch_browser,
};
pub use inventory::{Inventory, InventoryValue};
pub use llm::{ModelProvider, OpenAiCompatibleProvider, RetryableModelCaller};
pub use manager::BrowserManager;
pub use memory::{HttpMemoryService, MemoryService, NoopMemoryService};
