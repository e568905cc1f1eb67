//! Registry of concurrent browse sessions

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::core::Agent;
use super::session::BrowseSession;
use super::BrowseOptions;

/// Registry for managing multiple browse sessions, keyed by session id
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, Arc<BrowseSession>>,
}

/// Information about a single session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: String,
    pub objective: String,
    pub completed: bool,
    pub has_error: bool,
    pub step_count: usize,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register and start a session; returns its id
    pub async fn start(&self, agent: Agent, objective: String, options: BrowseOptions) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let session = Arc::new(BrowseSession::new(agent, objective, options));
        session.start().await;
        self.sessions.insert(id.clone(), session);
        info!("Started browse session {}", id);
        id
    }

    pub fn get(&self, id: &str) -> Option<Arc<BrowseSession>> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, id: &str) -> Option<Arc<BrowseSession>> {
        self.sessions.remove(id).map(|(_, session)| session)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// All sessions, sorted by id
    pub async fn list(&self) -> Vec<SessionInfo> {
        // Clone out first; shard guards must not be held across an await.
        let sessions: Vec<(String, Arc<BrowseSession>)> = self
            .sessions
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        let mut infos = Vec::with_capacity(sessions.len());
        for (id, session) in sessions {
            infos.push(SessionInfo {
                id,
                objective: session.objective().to_string(),
                completed: session.is_complete().await,
                has_error: session.has_error().await,
                step_count: session.step_count().await,
            });
        }
        infos.sort_by(|a, b| a.id.cmp(&b.id));
        infos
    }

    /// Drop finished sessions; returns how many were removed
    pub async fn cleanup_completed(&self) -> usize {
        let sessions: Vec<(String, Arc<BrowseSession>)> = self
            .sessions
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        let mut removed = 0;
        for (id, session) in sessions {
            if session.is_complete().await && self.sessions.remove(&id).is_some() {
                removed += 1;
            }
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentConfig;
    use crate::aria::AxSnapshotNode;
    use crate::llm::BackoffConfig;
    use crate::testing::{FakePage, RecordingMemory, ScriptedModel};
    use serde_json::json;
    use std::time::Duration;

    fn agent() -> Agent {
        Agent::new(
            Arc::new(FakePage::new(AxSnapshotNode::new("RootWebArea", "Example"))),
            Arc::new(ScriptedModel::new(vec![Ok(json!({
                "progressAssessment": "done",
                "objectiveComplete": {"result": "ok"},
                "description": "done"
            }))])),
            Arc::new(RecordingMemory::new()),
            AgentConfig::default(),
            BackoffConfig::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_sessions_are_listed_and_cleaned_up() {
        let registry = SessionRegistry::new();
        let first = registry
            .start(agent(), "one".into(), BrowseOptions::default())
            .await;
        let second = registry
            .start(agent(), "two".into(), BrowseOptions::default())
            .await;
        assert_ne!(first, second);
        assert_eq!(registry.len(), 2);

        tokio::time::sleep(Duration::from_millis(100)).await;

        let infos = registry.list().await;
        assert_eq!(infos.len(), 2);
        assert!(infos.iter().all(|i| i.completed && !i.has_error));

        assert_eq!(registry.cleanup_completed().await, 2);
        assert!(registry.is_empty());
        assert!(registry.get(&first).is_none());
    }

    #[tokio::test]
    async fn test_remove_returns_session() {
        let registry = SessionRegistry::new();
        let id = registry
            .start(agent(), "one".into(), BrowseOptions::default())
            .await;
        assert!(registry.remove(&id).is_some());
        assert!(registry.remove(&id).is_none());
    }
}
