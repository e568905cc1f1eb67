use tracing::debug;

use super::processor::AgentInner;
use crate::agent::AgentResult;
use crate::aria::{IndexMap, extract};
use crate::memory::ObjectiveState;

/// Observed state plus the index map its tree was built with
#[derive(Debug, Clone)]
pub(super) struct CapturedState {
    pub(super) state: ObjectiveState,
    pub(super) index_map: IndexMap,
}

/// Browser state management implementation
impl AgentInner {
    /// Snapshot the page into an [`ObjectiveState`]
    ///
    /// The returned index map is the only one actions of this turn may address.
    pub(super) async fn capture_state(
        &self,
        objective: &str,
        progress: Vec<String>,
    ) -> AgentResult<CapturedState> {
        let snapshot = self.page.accessibility_snapshot().await?;
        let extraction = extract(snapshot.as_ref());
        let url = self.page.url().await?;

        let state = ObjectiveState::new(objective, progress, &url, extraction.serialize());
        debug!(
            "Captured state at {} ({} indexed nodes)",
            state.url,
            extraction.index_map.len()
        );

        Ok(CapturedState {
            state,
            index_map: extraction.index_map,
        })
    }
}
