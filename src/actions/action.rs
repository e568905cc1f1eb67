use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    Down,
}

/// Representation requested by a `Get` action
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Text,
    Html,
    #[default]
    Markdown,
}

/// One browser command chosen by the model
///
/// `index` fields address the most recent extraction only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind")]
pub enum BrowserAction {
    Click {
        index: usize,
    },
    Type {
        index: usize,
        text: String,
    },
    Back,
    Wait,
    Hover {
        index: usize,
    },
    Scroll {
        direction: ScrollDirection,
    },
    GoTo {
        url: String,
    },
    Get {
        request: String,
        #[serde(rename = "type", default)]
        content_type: ContentType,
    },
    /// Any `kind` this build does not know; rejected at execution time
    #[serde(other)]
    #[schemars(skip)]
    Unknown,
}

/// Discriminant of [`BrowserAction`], used for shape validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    Click,
    Type,
    Back,
    Wait,
    Hover,
    Scroll,
    GoTo,
    Get,
    Unknown,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Click => "Click",
            ActionKind::Type => "Type",
            ActionKind::Back => "Back",
            ActionKind::Wait => "Wait",
            ActionKind::Hover => "Hover",
            ActionKind::Scroll => "Scroll",
            ActionKind::GoTo => "GoTo",
            ActionKind::Get => "Get",
            ActionKind::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl BrowserAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            BrowserAction::Click { .. } => ActionKind::Click,
            BrowserAction::Type { .. } => ActionKind::Type,
            BrowserAction::Back => ActionKind::Back,
            BrowserAction::Wait => ActionKind::Wait,
            BrowserAction::Hover { .. } => ActionKind::Hover,
            BrowserAction::Scroll { .. } => ActionKind::Scroll,
            BrowserAction::GoTo { .. } => ActionKind::GoTo,
            BrowserAction::Get { .. } => ActionKind::Get,
            BrowserAction::Unknown => ActionKind::Unknown,
        }
    }

    /// Target index, for the kinds that address a node
    pub fn index(&self) -> Option<usize> {
        match self {
            BrowserAction::Click { index }
            | BrowserAction::Type { index, .. }
            | BrowserAction::Hover { index } => Some(*index),
            _ => None,
        }
    }

    /// Copy of this action pointed at another node; index-less kinds are returned unchanged
    pub fn with_index(&self, new_index: usize) -> Self {
        let mut action = self.clone();
        match &mut action {
            BrowserAction::Click { index }
            | BrowserAction::Type { index, .. }
            | BrowserAction::Hover { index } => *index = new_index,
            _ => {}
        }
        action
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format_uses_kind_tag() {
        let action: BrowserAction =
            serde_json::from_str(r#"{"kind":"Type","index":5,"text":"gadget 11 pro price"}"#)
                .unwrap();
        assert_eq!(
            action,
            BrowserAction::Type {
                index: 5,
                text: "gadget 11 pro price".into()
            }
        );
        assert_eq!(
            serde_json::to_string(&BrowserAction::Back).unwrap(),
            r#"{"kind":"Back"}"#
        );
    }

    #[test]
    fn test_get_defaults_to_markdown() {
        let action: BrowserAction =
            serde_json::from_str(r#"{"kind":"Get","request":"price"}"#).unwrap();
        assert_eq!(
            action,
            BrowserAction::Get {
                request: "price".into(),
                content_type: ContentType::Markdown
            }
        );
    }

    #[test]
    fn test_unknown_kind_deserializes_to_unknown() {
        let action: BrowserAction =
            serde_json::from_str(r#"{"kind":"Teleport","index":3}"#).unwrap();
        assert_eq!(action.kind(), ActionKind::Unknown);
    }

    #[test]
    fn test_with_index_only_touches_addressing_kinds() {
        let click = BrowserAction::Click { index: 1 };
        assert_eq!(click.with_index(9).index(), Some(9));
        let scroll = BrowserAction::Scroll {
            direction: ScrollDirection::Down,
        };
        assert_eq!(scroll.with_index(9), scroll);
    }
}
