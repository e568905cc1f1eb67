use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::config::{AgentConfig, PromptConfig};
use super::messaging::{TurnReport, TurnRequest};
use crate::actions::ActionExecutor;
use crate::agent::{AgentError, AgentResult};
use crate::browser::BrowserPage;
use crate::llm::RetryableModelCaller;
use crate::memory::MemoryService;
use crate::utils::AgentState;

/// Shared agent state and processing logic (can be Arc-cloned)
pub(super) struct AgentInner {
    pub(super) page: Arc<dyn BrowserPage>,
    pub(super) executor: ActionExecutor,
    pub(super) caller: RetryableModelCaller,
    pub(super) memory: Arc<dyn MemoryService>,
    pub(super) config: AgentConfig,
    pub(super) prompts: PromptConfig,
    pub(super) agent_state: Arc<Mutex<AgentState>>,
    /// Groups every memorized step of this agent into one trajectory
    pub(super) sequence_id: String,
}

/// Core processing logic
impl AgentInner {
    /// Run one turn: capture, recall, prompt, call, validate, execute
    pub(super) async fn process_turn(&self, request: TurnRequest) -> AgentResult<TurnReport> {
        if self.agent_state.lock().await.is_stop_requested() {
            return Err(AgentError::Stopped);
        }

        let captured = self
            .capture_state(&request.objective, request.progress.clone())
            .await?;

        let exemplars = self
            .recall(&captured.state, request.inventory.as_deref())
            .await;

        let messages = self.build_messages(
            &captured.state,
            &exemplars,
            request.inventory.as_deref(),
        );

        let response = self
            .request_response(&messages, request.result_schema.as_ref())
            .await?;
        debug!("Model: {}", response.description);

        self.memorize_in_background(&captured.state, &response, request.inventory.clone());

        let action_results = match (&response.objective_complete, &response.command) {
            (Some(complete), _) => {
                info!("Objective complete: {}", complete.result);
                Vec::new()
            }
            (None, Some(command)) => {
                self.executor
                    .perform_many(
                        command,
                        &captured.index_map,
                        request.inventory.as_deref(),
                        self.config.batch_policy,
                    )
                    .await
            }
            (None, None) => Vec::new(),
        };

        let last_error = action_results
            .iter()
            .rev()
            .find_map(|r| r.error.clone());
        if let Some(error) = &last_error {
            warn!("Turn finished with action errors, last: {}", error);
        }
        self.agent_state.lock().await.set_last_error(last_error);

        Ok(TurnReport {
            state: captured.state,
            response,
            action_results,
        })
    }
}
