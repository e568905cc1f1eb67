mod core;
pub mod prompts;
mod registry;
mod session;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

pub use self::core::{Agent, AgentConfig, PromptConfig};
pub use prompts::{AgentMessagePrompt, SystemPrompt};
pub use registry::{SessionInfo, SessionRegistry};
pub use session::{BrowseSession, BrowseSessionOutput};

use crate::actions::{ActionResult, BrowserAction};
use crate::browser::BrowserError;
use crate::inventory::Inventory;
use crate::llm::ModelError;
use crate::memory::{MemoryError, ObjectiveState};

/// Completion payload; `extra` carries fields requested by a caller-supplied result schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ObjectiveComplete {
    pub result: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ObjectiveComplete {
    pub fn new(result: impl Into<String>) -> Self {
        Self {
            result: result.into(),
            extra: Map::new(),
        }
    }
}

/// One model turn as the model is asked to produce it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModelResponse {
    /// The model's own judgement of how far along the objective is
    pub progress_assessment: String,
    /// Actions to run against the current tree, in order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<BrowserAction>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objective_complete: Option<ObjectiveComplete>,
    /// Short summary of this step, appended to the progress log
    pub description: String,
}

impl ModelResponse {
    /// Deserialize and check a raw model answer
    ///
    /// When both `command` and `objectiveComplete` are present the completion
    /// wins and the command is discarded. A response with neither, or with an
    /// empty command, is rejected.
    pub fn from_value(value: Value) -> Result<Self, ModelError> {
        let mut response: ModelResponse = serde_json::from_value(value)
            .map_err(|e| ModelError::SchemaValidation(e.to_string()))?;

        if response.objective_complete.is_some() {
            if response.command.take().is_some() {
                warn!("Model sent both a command and objectiveComplete; ignoring the command");
            }
            return Ok(response);
        }

        match &response.command {
            Some(command) if !command.is_empty() => Ok(response),
            Some(_) => Err(ModelError::SchemaValidation(
                "command must contain at least one action".into(),
            )),
            None => Err(ModelError::SchemaValidation(
                "response has neither command nor objectiveComplete".into(),
            )),
        }
    }

    /// Check the completion payload against the `required` list of a result schema
    pub fn check_result_schema(&self, result_schema: Option<&Value>) -> Result<(), ModelError> {
        let (Some(schema), Some(complete)) = (result_schema, &self.objective_complete) else {
            return Ok(());
        };
        let required = schema
            .get("required")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str);
        for field in required {
            if field != "result" && !complete.extra.contains_key(field) {
                return Err(ModelError::SchemaValidation(format!(
                    "objectiveComplete is missing required field '{field}'"
                )));
            }
        }
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.objective_complete.is_some()
    }

    /// Copy with `f` applied to every free-text field, including typed text
    pub fn map_text(&self, f: impl Fn(&str) -> String) -> Self {
        let mut response = self.clone();
        response.progress_assessment = f(&self.progress_assessment);
        response.description = f(&self.description);
        if let Some(command) = response.command.as_mut() {
            for action in command.iter_mut() {
                if let BrowserAction::Type { text, .. } = action {
                    *text = f(text);
                }
            }
        }
        if let Some(complete) = response.objective_complete.as_mut() {
            complete.result = f(&complete.result);
        }
        response
    }
}

/// JSON schema sent with every model call
///
/// A caller-supplied `result_schema` is merged into `objectiveComplete` so the
/// model knows which extra fields to return.
pub fn response_schema(result_schema: Option<&Value>) -> Value {
    let mut schema = serde_json::to_value(schemars::schema_for!(ModelResponse))
        .unwrap_or_else(|_| Value::Object(Map::new()));

    if let Some(result_schema) = result_schema {
        let mut complete = result_schema.clone();
        if let Some(object) = complete.as_object_mut() {
            object.insert("type".into(), Value::String("object".into()));
            let properties = object
                .entry("properties")
                .or_insert_with(|| Value::Object(Map::new()));
            if let Some(properties) = properties.as_object_mut() {
                properties.insert("result".into(), serde_json::json!({ "type": "string" }));
            }
            let required = object
                .entry("required")
                .or_insert_with(|| Value::Array(Vec::new()));
            if let Some(required) = required.as_array_mut() {
                if !required.iter().any(|r| r == "result") {
                    required.push(Value::String("result".into()));
                }
            }
        }
        if let Some(properties) = schema.get_mut("properties").and_then(Value::as_object_mut) {
            properties.insert("objectiveComplete".into(), complete);
        }
    }

    schema
}

/// Terminal state of an objective
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ObjectiveOutcome {
    Complete { result: ObjectiveComplete },
    Failed { reason: String },
    MaxTurnsExceeded { turns: usize },
}

/// Error type for agent operations
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Model call exhausted: {0}")]
    ModelCallExhausted(String),

    #[error("Model response failed validation: {0}")]
    SchemaValidationFailed(String),

    #[error("Browser error: {0}")]
    BrowserError(#[from] BrowserError),

    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("Route diverged at step {step}: {reason}")]
    RouteDiverged { step: usize, reason: String },

    #[error("Agent stopped")]
    Stopped,

    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    #[error("Unexpected error: {0}")]
    UnexpectedError(String),
}

impl From<ModelError> for AgentError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::Exhausted { .. } => AgentError::ModelCallExhausted(err.to_string()),
            ModelError::SchemaValidation(msg) => AgentError::SchemaValidationFailed(msg),
            other => AgentError::UnexpectedError(other.to_string()),
        }
    }
}

/// Result type for agent operations
pub type AgentResult<T> = Result<T, AgentError>;

/// An entry in the agent history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentHistory {
    pub step: usize,
    pub url: String,
    pub response: ModelResponse,
    pub action_results: Vec<ActionResult>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub is_complete: bool,
}

/// A list of agent history entries
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentHistoryList {
    pub steps: Vec<AgentHistory>,
}

impl AgentHistoryList {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Add a step to the history, with explicit completion flag
    pub fn add_step_with_completion(
        &mut self,
        state: &ObjectiveState,
        response: ModelResponse,
        action_results: Vec<ActionResult>,
        is_complete: bool,
    ) {
        let step = AgentHistory {
            step: self.steps.len(),
            url: state.url.clone(),
            response,
            action_results,
            timestamp: chrono::Utc::now(),
            is_complete,
        };
        self.steps.push(step);
    }

    /// Returns true if any step marks the objective as complete
    pub fn is_complete(&self) -> bool {
        self.steps.iter().any(|s| s.is_complete)
    }

    /// Completion payload of the last completing step
    pub fn final_result(&self) -> Option<&ObjectiveComplete> {
        self.steps
            .iter()
            .rev()
            .find(|s| s.is_complete)
            .and_then(|s| s.response.objective_complete.as_ref())
    }

    /// Step descriptions in order; this is the progress log shown to the model
    pub fn progress(&self) -> Vec<String> {
        self.steps
            .iter()
            .map(|s| s.response.description.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct BrowseOptions {
    pub max_turns: Option<usize>,
    pub inventory: Option<Arc<Inventory>>,
    /// JSON schema the completion payload must satisfy
    pub result_schema: Option<Value>,
}

#[derive(Debug, Clone, Default)]
pub struct RouteOptions {
    pub result_schema: Option<Value>,
    pub inventory: Option<Arc<Inventory>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowseOutput {
    pub outcome: ObjectiveOutcome,
    pub history: AgentHistoryList,
}
