//! Rebuild a nested snapshot from CDP's flat `Accessibility.getFullAXTree` output

use serde_json::Value;
use std::collections::{HashMap, HashSet};

use crate::aria::AxSnapshotNode;

/// Roles whose children are hoisted into the parent instead of being emitted
const TRANSPARENT_ROLES: &[&str] = &["", "none", "presentation", "Ignored"];

/// Flat accessibility record, decoupled from the CDP wire types
#[derive(Debug, Clone, Default)]
pub struct AxRecord {
    pub id: String,
    pub parent_id: Option<String>,
    pub role: String,
    pub name: String,
    pub value: Option<Value>,
    pub child_ids: Vec<String>,
    pub ignored: bool,
}

/// Nest flat records into the snapshot shape the extractor consumes
///
/// Ignored and presentational nodes are transparent, generic containers with
/// children are flattened into their parent, and inline text boxes are dropped.
pub fn nest_ax_records(records: &[AxRecord]) -> Option<AxSnapshotNode> {
    let by_id: HashMap<&str, &AxRecord> = records.iter().map(|r| (r.id.as_str(), r)).collect();

    let root = records
        .iter()
        .find(|r| {
            r.parent_id
                .as_deref()
                .is_none_or(|parent| !by_id.contains_key(parent))
        })
        .or_else(|| records.first())?;

    let mut visited = HashSet::new();
    let mut nodes = build(root.id.as_str(), &by_id, &mut visited);

    match nodes.len() {
        0 => None,
        1 => nodes.pop(),
        _ => Some(AxSnapshotNode::new("RootWebArea", "").with_children(nodes)),
    }
}

fn build<'a>(
    id: &'a str,
    by_id: &HashMap<&'a str, &'a AxRecord>,
    visited: &mut HashSet<&'a str>,
) -> Vec<AxSnapshotNode> {
    let Some(record) = by_id.get(id) else {
        return Vec::new();
    };
    if !visited.insert(id) || record.role == "InlineTextBox" {
        return Vec::new();
    }

    let children: Vec<AxSnapshotNode> = record
        .child_ids
        .iter()
        .flat_map(|child| build(child.as_str(), by_id, visited))
        .collect();

    let transparent = record.ignored
        || TRANSPARENT_ROLES.contains(&record.role.as_str())
        || (record.role == "generic" && !children.is_empty());

    if transparent {
        return children;
    }

    vec![AxSnapshotNode {
        role: record.role.clone(),
        name: record.name.clone(),
        value: record.value.clone(),
        children,
    }]
}
