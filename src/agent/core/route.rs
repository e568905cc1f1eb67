use serde_json::Value;
use tracing::{info, warn};

use super::messaging::RouteRequest;
use super::processor::AgentInner;
use crate::actions::{BatchPolicy, BrowserAction, CommandShape, remap};
use crate::agent::{
    AgentError, AgentHistoryList, AgentResult, BrowseOutput, ObjectiveComplete, ObjectiveOutcome,
};
use crate::inventory::{Inventory, unresolved_placeholder};
use crate::memory::ObjectiveState;

/// Trajectory replay implementation
impl AgentInner {
    /// Replay a recorded trajectory against the live page
    ///
    /// Each recorded batch is remapped onto the current tree and must keep its
    /// shape; any dropped command or failed action ends the route. Recorded
    /// steps hold named inventory placeholders, so the live tree is compared in
    /// that form and typed text is resolved through the caller's inventory.
    pub(super) async fn follow_route(&self, request: RouteRequest) -> AgentResult<BrowseOutput> {
        let RouteRequest {
            trajectory_id,
            inventory,
            result_schema,
        } = request;

        let memories = self.memory.trajectory(&trajectory_id).await?;
        let mut history = AgentHistoryList::new();

        if memories.is_empty() {
            return Ok(BrowseOutput {
                outcome: ObjectiveOutcome::Failed {
                    reason: format!("Trajectory {trajectory_id} has no steps"),
                },
                history,
            });
        }

        info!(
            "Following trajectory {} ({} steps)",
            trajectory_id,
            memories.len()
        );

        for (position, memory) in memories.iter().enumerate() {
            let step = position + 1;
            if self.agent_state.lock().await.is_stop_requested() {
                return Err(AgentError::Stopped);
            }

            let captured = self
                .capture_state(&memory.objective_state.objective, history.progress())
                .await?;

            if let Some(recorded) = &memory.action_step.objective_complete {
                let result = self
                    .complete_route(
                        &captured.state,
                        recorded,
                        inventory.as_deref(),
                        result_schema.as_ref(),
                    )
                    .await;
                let mut response = memory.action_step.clone();
                response.objective_complete = Some(result.clone());
                history.add_step_with_completion(&captured.state, response, Vec::new(), true);
                return Ok(BrowseOutput {
                    outcome: ObjectiveOutcome::Complete { result },
                    history,
                });
            }

            let recorded = memory.action_step.command.clone().unwrap_or_default();
            let diverged = |reason: String| {
                warn!("Route {} diverged at step {}: {}", trajectory_id, step, reason);
                AgentError::RouteDiverged { step, reason }
            };

            let live_state = match inventory.as_deref() {
                Some(inventory) => captured.state.with_placeholders(inventory),
                None => captured.state.clone(),
            };
            let remapped = remap(&memory.objective_state, &live_state, &recorded)
                .map_err(|e| diverged(e.to_string()));
            let remapped = match remapped {
                Ok(remapped) => remapped,
                Err(e) => return Ok(failed(e, history)),
            };

            let shape = CommandShape::from_exemplars(&recorded);
            if let Err(mismatch) = shape.validate(&remapped.commands) {
                let detail = remapped
                    .dropped
                    .first()
                    .map(|d| format!("{mismatch} ({})", d.reason))
                    .unwrap_or_else(|| mismatch.to_string());
                return Ok(failed(diverged(detail), history));
            }

            let commands = match resolve_placeholders(remapped.commands, inventory.as_deref()) {
                Ok(commands) => commands,
                Err(name) => {
                    let reason = format!("inventory has no value named '{name}'");
                    return Ok(failed(diverged(reason), history));
                }
            };

            let results = self
                .executor
                .perform_many(
                    &commands,
                    &captured.index_map,
                    inventory.as_deref(),
                    BatchPolicy::AbortOnFirstError,
                )
                .await;

            let failure = results.iter().find_map(|r| r.error.clone());
            let mut response = memory.action_step.clone();
            response.command = Some(commands);
            history.add_step_with_completion(&captured.state, response, results, false);

            if let Some(error) = failure {
                self.agent_state
                    .lock()
                    .await
                    .set_last_error(Some(error.clone()));
                return Ok(failed(diverged(format!("action failed: {error}")), history));
            }
        }

        Ok(BrowseOutput {
            outcome: ObjectiveOutcome::Failed {
                reason: format!("Trajectory {trajectory_id} ended before the objective was complete"),
            },
            history,
        })
    }

    /// Ask the model for a fresh completion against live data, falling back to the recorded one
    async fn complete_route(
        &self,
        state: &ObjectiveState,
        recorded: &ObjectiveComplete,
        inventory: Option<&Inventory>,
        result_schema: Option<&Value>,
    ) -> ObjectiveComplete {
        let messages = self.build_messages(state, &[], inventory);
        match self.request_response(&messages, result_schema).await {
            Ok(response) => match response.objective_complete {
                Some(fresh) => fresh,
                None => {
                    warn!("Model did not complete the replayed objective, using the recorded result");
                    recorded.clone()
                }
            },
            Err(e) => {
                warn!("Fresh completion failed, using the recorded result: {}", e);
                recorded.clone()
            }
        }
    }
}

/// Turn placeholders in typed text into this session's masks
///
/// Fails with the placeholder's name when the inventory cannot supply it.
fn resolve_placeholders(
    commands: Vec<BrowserAction>,
    inventory: Option<&Inventory>,
) -> Result<Vec<BrowserAction>, String> {
    commands
        .into_iter()
        .map(|mut action| {
            if let BrowserAction::Type { text, .. } = &mut action {
                if let Some(inventory) = inventory {
                    *text = inventory.from_placeholders(text);
                }
                if let Some(name) = unresolved_placeholder(text) {
                    return Err(name.to_string());
                }
            }
            Ok(action)
        })
        .collect()
}

fn failed(error: AgentError, history: AgentHistoryList) -> BrowseOutput {
    BrowseOutput {
        outcome: ObjectiveOutcome::Failed {
            reason: error.to_string(),
        },
        history,
    }
}
