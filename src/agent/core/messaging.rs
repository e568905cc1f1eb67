use serde_json::Value;
use std::sync::Arc;
use tokio::sync::oneshot;

use crate::actions::ActionResult;
use crate::agent::{AgentResult, BrowseOutput, ModelResponse};
use crate::inventory::Inventory;
use crate::memory::ObjectiveState;

/// Everything one turn needs besides the page
#[derive(Debug, Clone)]
pub(super) struct TurnRequest {
    pub(super) objective: String,
    pub(super) progress: Vec<String>,
    pub(super) inventory: Option<Arc<Inventory>>,
    pub(super) result_schema: Option<Value>,
}

/// What one turn observed, decided and did
#[derive(Debug, Clone)]
pub(super) struct TurnReport {
    pub(super) state: ObjectiveState,
    pub(super) response: ModelResponse,
    pub(super) action_results: Vec<ActionResult>,
}

#[derive(Debug, Clone)]
pub(super) struct RouteRequest {
    pub(super) trajectory_id: String,
    pub(super) inventory: Option<Arc<Inventory>>,
    pub(super) result_schema: Option<Value>,
}

/// Agent command enum for internal message passing
pub(super) enum AgentCommand {
    RunTurn {
        request: TurnRequest,
        reply: oneshot::Sender<AgentResult<TurnReport>>,
    },
    FollowRoute {
        request: RouteRequest,
        reply: oneshot::Sender<AgentResult<BrowseOutput>>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
}
