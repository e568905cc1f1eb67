//! Structural validation of action batches
//!
//! A [`CommandShape`] captures only the count and per-position kind of a
//! known-good batch, so a fresh batch can be checked without constraining
//! its indices or text.

use thiserror::Error;

use super::action::{ActionKind, BrowserAction};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShapeMismatch {
    #[error("expected {expected} actions, got {found}")]
    Length { expected: usize, found: usize },

    #[error("action {position} should be {expected}, got {found}")]
    Kind {
        position: usize,
        expected: ActionKind,
        found: ActionKind,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandShape {
    kinds: Vec<ActionKind>,
}

impl CommandShape {
    pub fn from_exemplars(exemplars: &[BrowserAction]) -> Self {
        Self {
            kinds: exemplars.iter().map(BrowserAction::kind).collect(),
        }
    }

    pub fn kinds(&self) -> &[ActionKind] {
        &self.kinds
    }

    pub fn validate(&self, actions: &[BrowserAction]) -> Result<(), ShapeMismatch> {
        if actions.len() != self.kinds.len() {
            return Err(ShapeMismatch::Length {
                expected: self.kinds.len(),
                found: actions.len(),
            });
        }
        for (position, (expected, action)) in self.kinds.iter().zip(actions).enumerate() {
            let found = action.kind();
            if *expected != found {
                return Err(ShapeMismatch::Kind {
                    position,
                    expected: *expected,
                    found,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ScrollDirection;

    fn exemplar() -> Vec<BrowserAction> {
        vec![
            BrowserAction::Type {
                index: 5,
                text: "gadget 11 pro price".into(),
            },
            BrowserAction::Click { index: 7 },
        ]
    }

    #[test]
    fn test_same_shape_different_values_passes() {
        let shape = CommandShape::from_exemplars(&exemplar());
        let fresh = vec![
            BrowserAction::Type {
                index: 12,
                text: "something else".into(),
            },
            BrowserAction::Click { index: 3 },
        ];
        assert_eq!(shape.validate(&fresh), Ok(()));
    }

    #[test]
    fn test_wrong_length_fails() {
        let shape = CommandShape::from_exemplars(&exemplar());
        assert_eq!(
            shape.validate(&exemplar()[..1]),
            Err(ShapeMismatch::Length {
                expected: 2,
                found: 1
            })
        );
    }

    #[test]
    fn test_wrong_kind_at_position_fails() {
        let shape = CommandShape::from_exemplars(&exemplar());
        let fresh = vec![
            BrowserAction::Type {
                index: 5,
                text: "x".into(),
            },
            BrowserAction::Scroll {
                direction: ScrollDirection::Down,
            },
        ];
        assert_eq!(
            shape.validate(&fresh),
            Err(ShapeMismatch::Kind {
                position: 1,
                expected: ActionKind::Click,
                found: ActionKind::Scroll
            })
        );
    }
}
