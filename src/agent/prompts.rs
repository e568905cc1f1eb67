//! Prompt text for the objective loop

use crate::inventory::Inventory;
use crate::memory::{Memory, ObjectiveState};

const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a browser automation agent working towards an objective.

Every turn you receive the objective, your progress so far, the current URL and
the page as a compact accessibility tree. The tree is JSON:
- a string or number is plain text
- ["img", name] is an image
- [index, role, name] or [index, role, name, [children...]] is an element you can act on

Refer to elements only by the index shown in the current tree. Indices change
between turns.

Available commands (field "kind"):
- Click {index}
- Type {index, text}: replaces the field content and presses Enter
- Hover {index}
- Scroll {direction: "up" | "down"}
- Back
- Wait
- GoTo {url}
- Get {request, type: "text" | "html" | "markdown"}: read page content

Respond with JSON containing:
- progressAssessment: how far along the objective is
- description: one sentence describing what this step does
- command: one or more commands to run now, OR
- objectiveComplete: {result, ...} once the objective is achieved"#;

/// System prompt with optional extra instructions
#[derive(Debug, Clone)]
pub struct SystemPrompt {
    extra_instructions: Option<String>,
}

impl SystemPrompt {
    pub fn new(extra_instructions: Option<String>) -> Self {
        Self { extra_instructions }
    }

    pub fn build_prompt(&self) -> String {
        match &self.extra_instructions {
            Some(extra) if !extra.trim().is_empty() => {
                format!("{DEFAULT_SYSTEM_PROMPT}\n\nAdditional instructions:\n{extra}")
            }
            _ => DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl Default for SystemPrompt {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Renders an observed state as the user message of a turn
#[derive(Debug, Clone, Default)]
pub struct AgentMessagePrompt;

impl AgentMessagePrompt {
    pub fn new() -> Self {
        Self
    }

    pub fn build_message_prompt(&self, state: &ObjectiveState, inventory: Option<&Inventory>) -> String {
        let progress = if state.progress.is_empty() {
            "(nothing yet)".to_string()
        } else {
            state
                .progress
                .iter()
                .enumerate()
                .map(|(i, p)| format!("{}. {}", i + 1, p))
                .collect::<Vec<_>>()
                .join("\n")
        };

        let mut prompt = format!(
            "OBJECTIVE: {}\n\nPROGRESS:\n{}\n\nURL: {}\n\nARIA TREE:\n{}",
            state.objective, progress, state.url, state.aria_tree
        );

        if let Some(inventory) = inventory.filter(|i| !i.is_empty()) {
            prompt.push_str(
                "\n\nINVENTORY (type these values exactly as shown when a field needs them):\n",
            );
            prompt.push_str(&inventory.to_string());
        }

        prompt
    }

    /// Recorded memory rendered as a few-shot user/assistant pair
    pub fn build_exemplar(&self, memory: &Memory) -> (String, String) {
        let user = self.build_message_prompt(&memory.objective_state, None);
        let assistant = serde_json::to_string(&memory.action_step).unwrap_or_default();
        (user, assistant)
    }
}
