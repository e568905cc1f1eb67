use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identity of one extraction
///
/// Indices from different extractions are never comparable; every index that
/// crosses into resolution travels as a [`NodeRef`] carrying this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExtractionId(Uuid);

impl ExtractionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ExtractionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ExtractionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeEntry {
    pub index: usize,
    pub role: String,
    pub name: String,
}

/// An index bound to the extraction that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef {
    pub extraction: ExtractionId,
    pub index: usize,
}

/// `index -> (index, role, name)` table owned by a single extraction
#[derive(Debug, Clone)]
pub struct IndexMap {
    id: ExtractionId,
    entries: Vec<NodeEntry>,
}

impl IndexMap {
    pub(crate) fn new() -> Self {
        Self {
            id: ExtractionId::new(),
            entries: Vec::new(),
        }
    }

    /// Record a node and return its index (the current size of the map)
    pub(crate) fn push(&mut self, role: &str, name: &str) -> usize {
        let index = self.entries.len();
        self.entries.push(NodeEntry {
            index,
            role: role.to_string(),
            name: name.to_string(),
        });
        index
    }

    pub fn id(&self) -> ExtractionId {
        self.id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeEntry> {
        self.entries.iter()
    }

    /// Bind a raw model-supplied index to this extraction
    pub fn node_ref(&self, index: usize) -> NodeRef {
        NodeRef {
            extraction: self.id,
            index,
        }
    }

    /// Look up a node, refusing references minted by another extraction
    pub fn lookup(&self, node: NodeRef) -> Result<&NodeEntry, LookupError> {
        if node.extraction != self.id {
            return Err(LookupError::Stale {
                expected: self.id,
                found: node.extraction,
            });
        }
        self.entries
            .get(node.index)
            .ok_or(LookupError::UnknownIndex(node.index))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    Stale {
        expected: ExtractionId,
        found: ExtractionId,
    },
    UnknownIndex(usize),
}
