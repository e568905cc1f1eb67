//! Observed states, recorded steps and the collective memory seam

mod http;

pub use http::HttpMemoryService;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::agent::ModelResponse;
use crate::inventory::Inventory;

#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("Memory service request failed: {0}")]
    Transport(String),

    #[error("Memory service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode memory service response: {0}")]
    Decode(String),
}

/// Snapshot of everything the model sees about the page in one turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectiveState {
    pub objective: String,
    pub progress: Vec<String>,
    pub url: String,
    pub aria_tree: String,
}

impl ObjectiveState {
    pub fn new(
        objective: impl Into<String>,
        progress: Vec<String>,
        url: &str,
        aria_tree: impl Into<String>,
    ) -> Self {
        Self {
            objective: objective.into(),
            progress,
            url: strip_query(url),
            aria_tree: aria_tree.into(),
        }
    }

    /// Copy with every raw inventory secret in the tree replaced by its mask
    pub fn censored(&self, inventory: &Inventory) -> Self {
        Self {
            aria_tree: inventory.censor(&self.aria_tree),
            ..self.clone()
        }
    }

    /// Copy fit for storage: secrets and masks become named placeholders
    pub fn with_placeholders(&self, inventory: &Inventory) -> Self {
        self.map_text(|text| inventory.to_placeholders(text))
    }

    /// Copy of a stored state rendered with this session's masks
    pub fn with_masks(&self, inventory: &Inventory) -> Self {
        self.map_text(|text| inventory.from_placeholders(text))
    }

    fn map_text(&self, f: impl Fn(&str) -> String) -> Self {
        Self {
            objective: self.objective.clone(),
            progress: self.progress.iter().map(|p| f(p)).collect(),
            url: self.url.clone(),
            aria_tree: f(&self.aria_tree),
        }
    }
}

/// Drop the query string, keeping scheme, host, path and fragment
pub fn strip_query(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) => {
            parsed.set_query(None);
            parsed.to_string()
        }
        Err(_) => match raw.split_once('?') {
            Some((base, rest)) => match rest.split_once('#') {
                Some((_, fragment)) => format!("{base}#{fragment}"),
                None => base.to_string(),
            },
            None => raw.to_string(),
        },
    }
}

/// A state paired with the step taken from it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Memory {
    pub objective_state: ObjectiveState,
    pub action_step: ModelResponse,
}

/// Collective memory store
#[async_trait]
pub trait MemoryService: Send + Sync {
    async fn memorize(
        &self,
        sequence_id: &str,
        state: &ObjectiveState,
        action: &ModelResponse,
    ) -> Result<(), MemoryError>;

    /// Exemplars relevant to `state`, most relevant first
    async fn remember(
        &self,
        state: &ObjectiveState,
        sequence_id: Option<&str>,
    ) -> Result<Vec<Memory>, MemoryError>;

    /// Every recorded step of one trajectory, in order
    async fn trajectory(&self, trajectory_id: &str) -> Result<Vec<Memory>, MemoryError>;
}

/// Memory service that stores nothing and recalls nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMemoryService;

#[async_trait]
impl MemoryService for NoopMemoryService {
    async fn memorize(
        &self,
        _sequence_id: &str,
        _state: &ObjectiveState,
        _action: &ModelResponse,
    ) -> Result<(), MemoryError> {
        Ok(())
    }

    async fn remember(
        &self,
        _state: &ObjectiveState,
        _sequence_id: Option<&str>,
    ) -> Result<Vec<Memory>, MemoryError> {
        Ok(Vec::new())
    }

    async fn trajectory(&self, _trajectory_id: &str) -> Result<Vec<Memory>, MemoryError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::InventoryValue;

    #[test]
    fn test_query_string_is_stripped() {
        assert_eq!(
            strip_query("https://www.google.com/search?q=gadget&hl=en"),
            "https://www.google.com/search"
        );
        assert_eq!(
            strip_query("https://example.com/a?b=1#top"),
            "https://example.com/a#top"
        );
        assert_eq!(strip_query("not a url?x=1"), "not a url");
    }

    #[test]
    fn test_censored_state_hides_secrets() {
        let inventory =
            Inventory::new(vec![InventoryValue::string("Password", "Password123")]).unwrap();
        let state = ObjectiveState::new(
            "log in",
            vec![],
            "https://example.com/login",
            r#"[0,"textbox","Password123"]"#,
        );
        let censored = state.censored(&inventory);
        assert!(!censored.aria_tree.contains("Password123"));
        assert!(state.aria_tree.contains("Password123"));
        assert_eq!(censored.url, state.url);
    }

    #[test]
    fn test_stored_state_uses_named_placeholders() {
        let inventory =
            Inventory::new(vec![InventoryValue::string("Password", "Password123")]).unwrap();
        let state = ObjectiveState::new(
            "log in",
            vec!["typed Password123".into()],
            "https://example.com/login",
            r#"[0,"textbox","Password123"]"#,
        );

        let stored = state.with_placeholders(&inventory);
        assert_eq!(stored.aria_tree, r#"[0,"textbox","{{inventory:Password}}"]"#);
        assert_eq!(stored.progress, vec!["typed {{inventory:Password}}"]);

        let shown = stored.with_masks(&inventory);
        assert_eq!(shown.aria_tree, state.censored(&inventory).aria_tree);
        assert!(!shown.progress[0].contains("Password123"));
    }

    #[test]
    fn test_state_wire_names_are_camel_case() {
        let state = ObjectiveState::new("o", vec!["p".into()], "https://a.b/", "[]");
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["ariaTree"], "[]");
    }
}
