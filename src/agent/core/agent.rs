use std::sync::Arc;
use tokio::sync::{Mutex, RwLock, mpsc, oneshot};
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

use super::config::{AgentConfig, PromptConfig};
use super::messaging::{AgentCommand, RouteRequest, TurnReport, TurnRequest};
use super::processor::AgentInner;
use crate::actions::ActionExecutor;
use crate::agent::{
    AgentError, AgentHistoryList, AgentResult, BrowseOptions, BrowseOutput, ModelResponse,
    ObjectiveOutcome, RouteOptions,
};
use crate::browser::BrowserPage;
use crate::llm::{BackoffConfig, ModelProvider, RetryableModelCaller};
use crate::memory::MemoryService;
use crate::utils::AgentState;
use crate::utils::constants::MODEL_FAILURE_REASON;

/// Agent handle for controlling async actor (NOT Clone)
///
/// One agent drives one page. Turns are processed strictly one at a time by a
/// background task.
pub struct Agent {
    inner: Arc<AgentInner>,
    command_channel: mpsc::Sender<AgentCommand>,
    history: Arc<RwLock<AgentHistoryList>>,
    processor_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl Agent {
    pub fn new(
        page: Arc<dyn BrowserPage>,
        provider: Arc<dyn ModelProvider>,
        memory: Arc<dyn MemoryService>,
        config: AgentConfig,
        backoff: BackoffConfig,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let caller = RetryableModelCaller::new(provider, backoff)
            .with_attempt_timeout(Duration::from_secs(config.llm_timeout_secs));

        let inner = Arc::new(AgentInner {
            executor: ActionExecutor::new(Arc::clone(&page)),
            page,
            caller,
            memory,
            prompts: PromptConfig::from_config(&config),
            config,
            agent_state: Arc::new(Mutex::new(AgentState::new())),
            sequence_id: uuid::Uuid::new_v4().to_string(),
        });

        let processor_handle = Self::spawn_agent_processor(Arc::clone(&inner), cmd_rx);

        Self {
            inner,
            command_channel: cmd_tx,
            history: Arc::new(RwLock::new(AgentHistoryList::new())),
            processor_handle: Mutex::new(Some(processor_handle)),
        }
    }

    /// Id under which this agent's steps are memorized
    pub fn sequence_id(&self) -> &str {
        &self.inner.sequence_id
    }

    /// Snapshot of the steps taken so far
    pub async fn history(&self) -> AgentHistoryList {
        self.history.read().await.clone()
    }

    /// Error of the most recent failed action, if the last turn had one
    pub async fn last_error(&self) -> Option<String> {
        self.inner
            .agent_state
            .lock()
            .await
            .last_error()
            .map(str::to_string)
    }

    /// Run a single turn towards `objective` and return what the model decided
    ///
    /// The returned command has already been executed. Progress accumulates
    /// across calls until the next `browse`.
    pub async fn step(&self, objective: &str) -> AgentResult<ModelResponse> {
        let progress = self.history.read().await.progress();
        let report = self
            .run_turn(TurnRequest {
                objective: objective.to_string(),
                progress,
                inventory: None,
                result_schema: None,
            })
            .await?;
        let response = report.response.clone();
        self.record(report).await;
        Ok(response)
    }

    /// Drive the page until the objective completes, fails or runs out of turns
    pub async fn browse(&self, objective: &str, options: BrowseOptions) -> AgentResult<BrowseOutput> {
        let max_turns = options.max_turns.unwrap_or(self.inner.config.max_turns);
        *self.history.write().await = AgentHistoryList::new();

        for turn in 0..max_turns {
            debug!("Running agent turn {}/{}", turn + 1, max_turns);

            if self.is_stop_requested().await {
                info!("Agent browse stopped as requested");
                return Err(AgentError::Stopped);
            }
            if !self.is_running() {
                return Err(AgentError::ChannelClosed(
                    "Agent processor is no longer running".into(),
                ));
            }

            let progress = self.history.read().await.progress();
            let request = TurnRequest {
                objective: objective.to_string(),
                progress,
                inventory: options.inventory.clone(),
                result_schema: options.result_schema.clone(),
            };

            match self.run_turn(request).await {
                Ok(report) => {
                    let complete = report.response.objective_complete.clone();
                    self.record(report).await;
                    if let Some(result) = complete {
                        info!("Agent completed objective in {} turns", turn + 1);
                        return Ok(self.output(ObjectiveOutcome::Complete { result }).await);
                    }
                }
                Err(AgentError::ModelCallExhausted(e)) => {
                    error!("Model never produced a usable response: {}", e);
                    return Ok(self
                        .output(ObjectiveOutcome::Failed {
                            reason: MODEL_FAILURE_REASON.to_string(),
                        })
                        .await);
                }
                Err(e) => {
                    error!("Agent turn error: {}", e);
                    return Err(e);
                }
            }
        }

        warn!("Objective not reached within {} turns", max_turns);
        Ok(self
            .output(ObjectiveOutcome::MaxTurnsExceeded { turns: max_turns })
            .await)
    }

    /// Replay a recorded trajectory against the current page
    pub async fn follow_route(
        &self,
        trajectory_id: &str,
        options: RouteOptions,
    ) -> AgentResult<BrowseOutput> {
        let (reply, receiver) = oneshot::channel();
        self.send(AgentCommand::FollowRoute {
            request: RouteRequest {
                trajectory_id: trajectory_id.to_string(),
                inventory: options.inventory,
                result_schema: options.result_schema,
            },
            reply,
        })
        .await?;

        let output = receiver
            .await
            .map_err(|_| AgentError::ChannelClosed("Route reply dropped".into()))??;
        *self.history.write().await = output.history.clone();
        Ok(output)
    }

    /// Gracefully shut down the agent processor
    ///
    /// A turn already in flight is allowed to finish; no further turns start.
    ///
    /// # Errors
    /// - `AgentError::ChannelClosed`: Command channel already closed (processor dead)
    /// - `AgentError::UnexpectedError`: Processor didn't respond within timeout
    pub async fn stop(&self) -> AgentResult<()> {
        debug!("Stopping agent processor");
        self.inner.agent_state.lock().await.request_stop();

        let (reply, receiver) = oneshot::channel();
        self.command_channel
            .send(AgentCommand::Stop { reply })
            .await
            .map_err(|_| {
                AgentError::ChannelClosed(
                    "Cannot stop agent: command channel already closed".into(),
                )
            })?;

        match tokio::time::timeout(Duration::from_secs(5), receiver).await {
            Ok(_) => {
                if let Some(handle) = self.processor_handle.lock().await.take() {
                    if let Err(e) = handle.await {
                        warn!("Agent processor ended abnormally: {}", e);
                    }
                }
                info!("Agent processor stopped gracefully");
                Ok(())
            }
            Err(_) => {
                error!("Agent processor did not respond to Stop within 5 seconds");
                Err(AgentError::UnexpectedError(
                    "Agent processor stop timeout - processor may be stuck".into(),
                ))
            }
        }
    }

    /// Check if agent processor is still running
    pub fn is_running(&self) -> bool {
        !self.command_channel.is_closed()
    }

    async fn is_stop_requested(&self) -> bool {
        self.inner.agent_state.lock().await.is_stop_requested()
    }

    async fn send(&self, command: AgentCommand) -> AgentResult<()> {
        self.command_channel
            .send(command)
            .await
            .map_err(|_| AgentError::ChannelClosed("Command channel closed".into()))
    }

    async fn run_turn(&self, request: TurnRequest) -> AgentResult<TurnReport> {
        let (reply, receiver) = oneshot::channel();
        self.send(AgentCommand::RunTurn { request, reply }).await?;
        receiver
            .await
            .map_err(|_| AgentError::ChannelClosed("Turn reply dropped".into()))?
    }

    async fn record(&self, report: TurnReport) {
        let is_complete = report.response.is_complete();
        self.history.write().await.add_step_with_completion(
            &report.state,
            report.response,
            report.action_results,
            is_complete,
        );
    }

    async fn output(&self, outcome: ObjectiveOutcome) -> BrowseOutput {
        BrowseOutput {
            outcome,
            history: self.history.read().await.clone(),
        }
    }

    fn spawn_agent_processor(
        inner: Arc<AgentInner>,
        mut cmd_rx: mpsc::Receiver<AgentCommand>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(cmd) = cmd_rx.recv().await {
                match cmd {
                    AgentCommand::RunTurn { request, reply } => {
                        let result = inner.process_turn(request).await;
                        if reply.send(result).is_err() {
                            warn!("Turn finished after its caller went away");
                        }
                    }
                    AgentCommand::FollowRoute { request, reply } => {
                        let result = inner.follow_route(request).await;
                        if reply.send(result).is_err() {
                            warn!("Route finished after its caller went away");
                        }
                    }
                    AgentCommand::Stop { reply } => {
                        let _ = reply.send(());
                        break;
                    }
                }
            }
            debug!("Agent processor shutting down cleanly");
        })
    }
}
