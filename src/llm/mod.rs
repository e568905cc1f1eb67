//! Model provider seam and the retrying caller around it

mod openai;
mod retry;

pub use openai::OpenAiCompatibleProvider;
pub use retry::{BackoffConfig, RetryableModelCaller};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Model transport error: {0}")]
    Transport(String),

    #[error("Model returned an invalid response: {0}")]
    InvalidResponse(String),

    #[error("Model response failed validation: {0}")]
    SchemaValidation(String),

    #[error("Model call failed after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A chat model able to answer with JSON conforming to a schema
///
/// Conformance is requested, not trusted: callers validate what comes back.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage], schema: &Value) -> Result<Value, ModelError>;
}
