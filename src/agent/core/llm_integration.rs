use std::sync::Arc;
use tracing::{debug, warn};

use super::processor::AgentInner;
use crate::agent::{AgentResult, ModelResponse, response_schema};
use crate::inventory::Inventory;
use crate::llm::ChatMessage;
use crate::memory::{Memory, ObjectiveState};

/// LLM integration implementation
impl AgentInner {
    /// Best-effort recall of exemplars for `state`; failures yield none
    pub(super) async fn recall(
        &self,
        state: &ObjectiveState,
        inventory: Option<&Inventory>,
    ) -> Vec<Memory> {
        if self.config.max_exemplars == 0 {
            return Vec::new();
        }
        let query = match inventory {
            Some(inventory) => state.with_placeholders(inventory),
            None => state.clone(),
        };
        match self.memory.remember(&query, None).await {
            Ok(mut memories) => {
                memories.truncate(self.config.max_exemplars);
                debug!("Recalled {} exemplars", memories.len());
                memories
            }
            Err(e) => {
                warn!("Memory recall failed, continuing without exemplars: {}", e);
                Vec::new()
            }
        }
    }

    /// System prompt, exemplar pairs, then the current state
    ///
    /// Raw inventory secrets visible on the page are censored before the
    /// state is rendered; the model only ever sees masked placeholders.
    pub(super) fn build_messages(
        &self,
        state: &ObjectiveState,
        exemplars: &[Memory],
        inventory: Option<&Inventory>,
    ) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(2 + exemplars.len() * 2);
        messages.push(ChatMessage::system(self.prompts.system_prompt.build_prompt()));

        for memory in exemplars {
            let (user, assistant) = match inventory {
                Some(inventory) => self.prompts.agent_prompt.build_exemplar(&Memory {
                    objective_state: memory.objective_state.with_masks(inventory),
                    action_step: memory
                        .action_step
                        .map_text(|text| inventory.from_placeholders(text)),
                }),
                None => self.prompts.agent_prompt.build_exemplar(memory),
            };
            messages.push(ChatMessage::user(user));
            messages.push(ChatMessage::assistant(assistant));
        }

        let rendered = match inventory {
            Some(inventory) => self
                .prompts
                .agent_prompt
                .build_message_prompt(&state.censored(inventory), Some(inventory)),
            None => self.prompts.agent_prompt.build_message_prompt(state, None),
        };
        messages.push(ChatMessage::user(rendered));
        messages
    }

    /// Call the model until it returns a valid [`ModelResponse`]
    pub(super) async fn request_response(
        &self,
        messages: &[ChatMessage],
        result_schema: Option<&serde_json::Value>,
    ) -> AgentResult<ModelResponse> {
        let schema = response_schema(result_schema);
        let response = self
            .caller
            .call(messages, &schema, |value| {
                let response = ModelResponse::from_value(value)?;
                response.check_result_schema(result_schema)?;
                Ok(response)
            })
            .await?;
        Ok(response)
    }

    /// Persist a step without blocking the turn
    ///
    /// Stored steps carry named inventory placeholders, never secrets or
    /// this session's masks.
    pub(super) fn memorize_in_background(
        &self,
        state: &ObjectiveState,
        response: &ModelResponse,
        inventory: Option<Arc<Inventory>>,
    ) {
        let memory = Arc::clone(&self.memory);
        let sequence_id = self.sequence_id.clone();
        let (state, response) = match inventory.as_deref() {
            Some(inventory) => (
                state.with_placeholders(inventory),
                response.map_text(|text| inventory.to_placeholders(text)),
            ),
            None => (state.clone(), response.clone()),
        };

        tokio::spawn(async move {
            if let Err(e) = memory.memorize(&sequence_id, &state, &response).await {
                warn!("Failed to memorize step for {}: {}", sequence_id, e);
            }
        });
    }
}
