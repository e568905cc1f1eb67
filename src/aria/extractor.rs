use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::index_map::IndexMap;
use super::tree::{AriaNode, serialize_tree};

/// Roles collapsed to their bare name
const TEXT_ROLES: &[&str] = &["StaticText", "text", "generic"];

/// Roles collapsed to an `["img", name]` leaf
const IMAGE_ROLES: &[&str] = &["img", "image"];

/// Raw accessibility snapshot node as produced by the browser provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AxSnapshotNode {
    pub role: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<AxSnapshotNode>,
}

impl AxSnapshotNode {
    pub fn new(role: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            name: name.into(),
            value: None,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<AxSnapshotNode>) -> Self {
        self.children = children;
        self
    }

    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }
}

/// Result of one extraction: the compact tree plus its index map
#[derive(Debug, Clone)]
pub struct Extraction {
    pub tree: Option<AriaNode>,
    pub index_map: IndexMap,
}

impl Extraction {
    pub fn serialize(&self) -> String {
        serialize_tree(self.tree.as_ref())
    }
}

/// Simplify a raw snapshot into an indexed tree
///
/// Indices are assigned in pre-order from 0 and are valid only against the
/// returned [`IndexMap`]. An absent snapshot yields an empty tree.
pub fn extract(snapshot: Option<&AxSnapshotNode>) -> Extraction {
    let mut index_map = IndexMap::new();
    let tree = snapshot.map(|root| simplify(root, &mut index_map));
    debug!(
        extraction = %index_map.id(),
        nodes = index_map.len(),
        "Extracted accessibility tree"
    );
    Extraction { tree, index_map }
}

fn simplify(node: &AxSnapshotNode, index_map: &mut IndexMap) -> AriaNode {
    if TEXT_ROLES.contains(&node.role.as_str()) {
        return AriaNode::Text(node.name.clone());
    }
    if IMAGE_ROLES.contains(&node.role.as_str()) {
        return AriaNode::Image(node.name.clone());
    }

    let index = index_map.push(&node.role, &node.name);

    let children = if !node.children.is_empty() {
        Some(
            node.children
                .iter()
                .map(|child| simplify(child, index_map))
                .collect(),
        )
    } else {
        node.value.as_ref().map(|value| vec![value_leaf(value)])
    };

    AriaNode::Composite {
        index,
        role: node.role.clone(),
        name: node.name.clone(),
        children,
    }
}

fn value_leaf(value: &Value) -> AriaNode {
    match value {
        Value::String(s) => AriaNode::Text(s.clone()),
        Value::Number(n) => AriaNode::Number(n.clone()),
        other => AriaNode::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn google_snapshot() -> AxSnapshotNode {
        AxSnapshotNode::new("RootWebArea", "Google").with_children(vec![
            AxSnapshotNode::new("link", "Gmail"),
            AxSnapshotNode::new("generic", "").with_children(vec![AxSnapshotNode::new(
                "StaticText",
                "ignored child",
            )]),
            AxSnapshotNode::new("img", "Google"),
            AxSnapshotNode::new("navigation", "").with_children(vec![
                AxSnapshotNode::new("link", "Images"),
                AxSnapshotNode::new("button", "Apps"),
            ]),
            AxSnapshotNode::new("combobox", "Search").with_value("gadget"),
        ])
    }

    #[test]
    fn test_indices_are_preorder_without_gaps() {
        let extraction = extract(Some(&google_snapshot()));
        let flat = extraction.tree.as_ref().unwrap().composites();
        let indices: Vec<usize> = flat.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4, 5]);

        let roles: Vec<&str> = flat.iter().map(|c| c.role).collect();
        assert_eq!(
            roles,
            vec!["RootWebArea", "link", "navigation", "link", "button", "combobox"]
        );
        assert_eq!(extraction.index_map.len(), 6);
    }

    #[test]
    fn test_leaves_never_indexed() {
        let extraction = extract(Some(&google_snapshot()));
        assert!(
            extraction
                .index_map
                .iter()
                .all(|e| !["StaticText", "generic", "img"].contains(&e.role.as_str()))
        );
        let serialized = extraction.serialize();
        assert!(serialized.contains(r#"["img","Google"]"#));
    }

    #[test]
    fn test_value_becomes_synthetic_child() {
        let extraction = extract(Some(&google_snapshot()));
        assert!(
            extraction
                .serialize()
                .ends_with(r#"[5,"combobox","Search",["gadget"]]]]"#)
        );
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let snapshot = google_snapshot();
        let first = extract(Some(&snapshot));
        let second = extract(Some(&snapshot));
        assert_eq!(first.serialize(), second.serialize());
        assert_ne!(first.index_map.id(), second.index_map.id());
    }

    #[test]
    fn test_empty_snapshot_yields_empty_tree() {
        let extraction = extract(None);
        assert!(extraction.tree.is_none());
        assert!(extraction.index_map.is_empty());
        assert_eq!(extraction.serialize(), "[]");
    }

    #[test]
    fn test_snapshot_deserializes_from_provider_json() {
        let json = r#"{"role":"RootWebArea","name":"Doc","children":[{"role":"textbox","name":"Age","value":42}]}"#;
        let snapshot: AxSnapshotNode = serde_json::from_str(json).unwrap();
        let extraction = extract(Some(&snapshot));
        assert_eq!(
            extraction.serialize(),
            r#"[0,"RootWebArea","Doc",[[1,"textbox","Age",[42]]]]"#
        );
    }
}
