//! Background browse sessions

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use super::core::Agent;
use super::{AgentHistoryList, BrowseOptions, ObjectiveOutcome};

/// Session state for an objective running in the background
#[derive(Clone)]
pub struct BrowseSession {
    agent: Arc<Agent>,
    objective: String,
    options: BrowseOptions,
    outcome: Arc<RwLock<Option<ObjectiveOutcome>>>,
    task_handle: Arc<RwLock<Option<JoinHandle<()>>>>,
    completed: Arc<RwLock<bool>>,
    error: Arc<RwLock<Option<String>>>,
}

/// Progress snapshot of a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowseSessionOutput {
    pub objective: String,
    pub history: AgentHistoryList,
    pub outcome: Option<ObjectiveOutcome>,
    pub completed: bool,
    pub error: Option<String>,
    pub summary: String,
}

impl BrowseSession {
    pub fn new(agent: Agent, objective: String, options: BrowseOptions) -> Self {
        Self {
            agent: Arc::new(agent),
            objective,
            options,
            outcome: Arc::new(RwLock::new(None)),
            task_handle: Arc::new(RwLock::new(None)),
            completed: Arc::new(RwLock::new(false)),
            error: Arc::new(RwLock::new(None)),
        }
    }

    pub fn objective(&self) -> &str {
        &self.objective
    }

    /// Start browsing in the background
    pub async fn start(&self) {
        let agent = self.agent.clone();
        let objective = self.objective.clone();
        let options = self.options.clone();
        let outcome = self.outcome.clone();
        let completed = self.completed.clone();
        let error = self.error.clone();

        let handle = tokio::spawn(async move {
            match agent.browse(&objective, options).await {
                Ok(output) => {
                    *outcome.write().await = Some(output.outcome);
                }
                Err(e) => {
                    *error.write().await = Some(e.to_string());
                }
            }
            *completed.write().await = true;
        });

        *self.task_handle.write().await = Some(handle);
    }

    /// Read current progress
    pub async fn read(&self) -> BrowseSessionOutput {
        let history = self.agent.history().await;
        let outcome = self.outcome.read().await.clone();
        let completed = *self.completed.read().await;
        let error = self.error.read().await.clone();

        let summary = match (&error, &outcome) {
            (Some(err), _) => format!("Session failed: {}", err),
            (None, Some(ObjectiveOutcome::Complete { result })) => {
                format!("Objective complete after {} steps: {}", history.len(), result.result)
            }
            (None, Some(ObjectiveOutcome::Failed { reason })) => {
                format!("Objective failed after {} steps: {}", history.len(), reason)
            }
            (None, Some(ObjectiveOutcome::MaxTurnsExceeded { turns })) => {
                format!("Objective not reached within {} turns", turns)
            }
            (None, None) => format!("In progress. {} steps so far.", history.len()),
        };

        BrowseSessionOutput {
            objective: self.objective.clone(),
            history,
            outcome,
            completed,
            error,
            summary,
        }
    }

    /// Stop the agent after its current turn, then abort the background task
    pub async fn kill(&self) -> Result<()> {
        self.agent.stop().await?;

        if let Some(handle) = self.task_handle.write().await.take() {
            handle.abort();
        }
        *self.completed.write().await = true;

        Ok(())
    }

    pub async fn is_complete(&self) -> bool {
        *self.completed.read().await
    }

    pub async fn step_count(&self) -> usize {
        self.agent.history().await.len()
    }

    pub async fn has_error(&self) -> bool {
        self.error.read().await.is_some()
    }
}
