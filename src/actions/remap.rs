//! Re-targeting recorded commands onto a fresh tree
//!
//! A node's `(role, name)` pair stands in for its identity across reloads;
//! positional indices are not stable.

use std::collections::HashMap;
use tracing::{debug, warn};

use super::action::BrowserAction;
use crate::aria::{AriaNode, TreeError, parse_tree};
use crate::memory::ObjectiveState;

/// A recorded command that had no counterpart in the new tree
#[derive(Debug, Clone, PartialEq)]
pub struct DroppedCommand {
    pub position: usize,
    pub action: BrowserAction,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemapOutcome {
    pub commands: Vec<BrowserAction>,
    pub dropped: Vec<DroppedCommand>,
}

fn identity_key(role: &str, name: &str) -> String {
    serde_json::to_string(&(role, name)).unwrap_or_else(|_| format!("{role}\u{0}{name}"))
}

fn parse_root(state: &ObjectiveState) -> Result<Option<AriaNode>, TreeError> {
    parse_tree(&state.aria_tree)
}

/// Rewrite the indices of `old_commands` (recorded against `old_state`) so they
/// address the same `(role, name)` nodes in `new_state`
///
/// Commands without an index pass through. Commands whose node is missing from
/// either tree are dropped and reported; order of the survivors is preserved.
/// When several new nodes share an identity, the first in pre-order wins.
pub fn remap(
    old_state: &ObjectiveState,
    new_state: &ObjectiveState,
    old_commands: &[BrowserAction],
) -> Result<RemapOutcome, TreeError> {
    let old_root = parse_root(old_state)?;
    let new_root = parse_root(new_state)?;

    let old_by_index: HashMap<usize, String> = old_root
        .as_ref()
        .map(|root| {
            root.composites()
                .into_iter()
                .map(|c| (c.index, identity_key(c.role, c.name)))
                .collect()
        })
        .unwrap_or_default();

    let mut new_by_key: HashMap<String, usize> = HashMap::new();
    if let Some(root) = new_root.as_ref() {
        for node in root.composites() {
            new_by_key
                .entry(identity_key(node.role, node.name))
                .or_insert(node.index);
        }
    }

    let mut commands = Vec::with_capacity(old_commands.len());
    let mut dropped = Vec::new();

    for (position, action) in old_commands.iter().enumerate() {
        let Some(old_index) = action.index() else {
            commands.push(action.clone());
            continue;
        };

        let Some(key) = old_by_index.get(&old_index) else {
            dropped.push(DroppedCommand {
                position,
                action: action.clone(),
                reason: format!("index {old_index} is not in the recorded tree"),
            });
            continue;
        };

        match new_by_key.get(key) {
            Some(&new_index) => {
                debug!("Remapped {} -> {} for {}", old_index, new_index, key);
                commands.push(action.with_index(new_index));
            }
            None => {
                warn!("No node matching {} in the current tree", key);
                dropped.push(DroppedCommand {
                    position,
                    action: action.clone(),
                    reason: format!("no node matching {key} in the current tree"),
                });
            }
        }
    }

    Ok(RemapOutcome { commands, dropped })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ScrollDirection;

    fn state(tree: &str) -> ObjectiveState {
        ObjectiveState::new("objective", vec![], "https://www.google.com/", tree)
    }

    const OLD: &str = r#"[0,"RootWebArea","Google",[[1,"link","Gmail"],[5,"combobox","Search"],[6,"button","Google Search"]]]"#;
    const NEW: &str = r#"[0,"RootWebArea","Google",[[1,"banner","",[[2,"link","Gmail"],[3,"link","Images"]]],[4,"combobox","Search"],[7,"button","Google Search"]]]"#;

    fn role_name(tree: &str, index: usize) -> (String, String) {
        let root = parse_tree(tree).unwrap().unwrap();
        let node = root
            .composites()
            .into_iter()
            .find(|c| c.index == index)
            .unwrap();
        (node.role.to_string(), node.name.to_string())
    }

    #[test]
    fn test_indices_follow_role_and_name() {
        let commands = vec![
            BrowserAction::Type {
                index: 5,
                text: "gadget 11 pro price".into(),
            },
            BrowserAction::Wait,
            BrowserAction::Click { index: 6 },
        ];
        let outcome = remap(&state(OLD), &state(NEW), &commands).unwrap();

        assert!(outcome.dropped.is_empty());
        assert_eq!(outcome.commands.len(), 3);
        assert_eq!(outcome.commands[0].index(), Some(4));
        assert_eq!(outcome.commands[1], BrowserAction::Wait);
        assert_eq!(outcome.commands[2].index(), Some(7));

        for (old, new) in commands.iter().zip(&outcome.commands) {
            if let (Some(o), Some(n)) = (old.index(), new.index()) {
                assert_eq!(role_name(OLD, o), role_name(NEW, n));
            }
        }
    }

    #[test]
    fn test_unmatched_commands_are_dropped_in_order() {
        let new = r#"[0,"RootWebArea","Google",[[1,"combobox","Search"]]]"#;
        let commands = vec![
            BrowserAction::Click { index: 1 },
            BrowserAction::Scroll {
                direction: ScrollDirection::Down,
            },
            BrowserAction::Type {
                index: 5,
                text: "x".into(),
            },
            BrowserAction::Hover { index: 99 },
        ];
        let outcome = remap(&state(OLD), &state(new), &commands).unwrap();

        let kept: Vec<_> = outcome.commands.iter().map(|c| c.kind()).collect();
        assert_eq!(
            kept,
            vec![
                crate::actions::ActionKind::Scroll,
                crate::actions::ActionKind::Type
            ]
        );
        assert_eq!(outcome.commands[1].index(), Some(1));
        let positions: Vec<usize> = outcome.dropped.iter().map(|d| d.position).collect();
        assert_eq!(positions, vec![0, 3]);
    }

    #[test]
    fn test_duplicate_identities_take_first_in_preorder() {
        let new = r#"[0,"RootWebArea","",[[1,"link","More"],[2,"link","More"]]]"#;
        let old = r#"[0,"RootWebArea","",[[1,"list","",[[2,"link","More"]]]]]"#;
        let outcome = remap(
            &state(old),
            &state(new),
            &[BrowserAction::Click { index: 2 }],
        )
        .unwrap();
        assert_eq!(outcome.commands[0].index(), Some(1));
    }

    #[test]
    fn test_malformed_tree_is_an_error() {
        assert!(remap(&state("{"), &state(NEW), &[]).is_err());
    }
}
