//! Index -> live element resolution
//!
//! Resolution is inherently racy: the page may have changed since extraction,
//! in which case the `(role, name)` pair may be gone or may now match a
//! different element. Callers surface that as an action-level failure.

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use super::{BrowserError, BrowserPage, ElementHandle};
use crate::aria::{ExtractionId, IndexMap, LookupError, NodeRef};

/// Roles that are plain text and never a resolution target
const PLAIN_TEXT_ROLES: &[&str] = &["StaticText", "text", "InlineTextBox"];

#[derive(Error, Debug)]
pub enum ElementError {
    #[error("Index {0} does not exist in the current extraction")]
    UnknownIndex(usize),

    #[error("Index {index} belongs to extraction {found}, current extraction is {expected}")]
    StaleExtraction {
        index: usize,
        expected: ExtractionId,
        found: ExtractionId,
    },

    #[error("No live element matches {role} \"{name}\" (index {index})")]
    NotFound {
        index: usize,
        role: String,
        name: String,
    },

    #[error("Element {role} \"{name}\" (index {index}) could not be adopted: {reason}")]
    AdoptionFailed {
        index: usize,
        role: String,
        name: String,
        reason: String,
    },

    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),
}

/// Maps an extraction-bound index back to an actionable element handle
#[derive(Clone)]
pub struct ElementResolver {
    page: Arc<dyn BrowserPage>,
}

impl ElementResolver {
    pub fn new(page: Arc<dyn BrowserPage>) -> Self {
        Self { page }
    }

    pub async fn resolve(&self, node: NodeRef, map: &IndexMap) -> Result<ElementHandle, ElementError> {
        let entry = map.lookup(node).map_err(|e| match e {
            LookupError::Stale { expected, found } => ElementError::StaleExtraction {
                index: node.index,
                expected,
                found,
            },
            LookupError::UnknownIndex(index) => ElementError::UnknownIndex(index),
        })?;

        let matches = self
            .page
            .query_accessibility(&entry.role, &entry.name)
            .await?;

        let backend_node_id = matches
            .iter()
            .filter(|m| !PLAIN_TEXT_ROLES.contains(&m.role.as_str()))
            .find_map(|m| m.backend_node_id)
            .ok_or_else(|| ElementError::NotFound {
                index: entry.index,
                role: entry.role.clone(),
                name: entry.name.clone(),
            })?;

        debug!(
            "Index {} ({} \"{}\") matched backend node {}",
            entry.index, entry.role, entry.name, backend_node_id
        );

        self.page
            .adopt_backend_node(backend_node_id)
            .await
            .map_err(|e| {
                warn!("Adoption of backend node {} failed: {}", backend_node_id, e);
                ElementError::AdoptionFailed {
                    index: entry.index,
                    role: entry.role.clone(),
                    name: entry.name.clone(),
                    reason: e.to_string(),
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aria::{AxSnapshotNode, extract};
    use crate::testing::FakePage;

    fn google() -> AxSnapshotNode {
        AxSnapshotNode::new("RootWebArea", "Google").with_children(vec![
            AxSnapshotNode::new("link", "Gmail"),
            AxSnapshotNode::new("StaticText", "Search"),
            AxSnapshotNode::new("combobox", "Search"),
        ])
    }

    #[tokio::test]
    async fn test_resolve_on_same_snapshot_succeeds() {
        let page = Arc::new(FakePage::new(google()));
        let extraction = extract(Some(&google()));
        let resolver = ElementResolver::new(page.clone());

        for entry in extraction.index_map.iter() {
            let node = extraction.index_map.node_ref(entry.index);
            let handle = resolver.resolve(node, &extraction.index_map).await.unwrap();
            assert_eq!(
                Some(handle.backend_node_id),
                page.backend_id_of(&entry.role, &entry.name)
            );
        }
    }

    #[tokio::test]
    async fn test_plain_text_matches_are_skipped() {
        let page = Arc::new(FakePage::new(google()));
        page.match_any_role(true);
        let extraction = extract(Some(&google()));

        let matches = page.query_accessibility("combobox", "Search").await.unwrap();
        assert_eq!(matches[0].role, "StaticText");
        let resolver = ElementResolver::new(page.clone());

        let combobox = extraction.index_map.node_ref(2);
        let handle = resolver
            .resolve(combobox, &extraction.index_map)
            .await
            .unwrap();
        assert_eq!(
            Some(handle.backend_node_id),
            page.backend_id_of("combobox", "Search")
        );
        assert_ne!(
            Some(handle.backend_node_id),
            page.backend_id_of("StaticText", "Search")
        );
    }

    #[tokio::test]
    async fn test_missing_element_is_not_found() {
        let page = Arc::new(FakePage::new(google()));
        let extraction = extract(Some(&google()));
        page.set_snapshot(AxSnapshotNode::new("RootWebArea", "Google"));

        let resolver = ElementResolver::new(page);
        let err = resolver
            .resolve(extraction.index_map.node_ref(1), &extraction.index_map)
            .await
            .unwrap_err();
        assert!(matches!(err, ElementError::NotFound { index: 1, .. }));
    }

    #[tokio::test]
    async fn test_adoption_failure_is_distinct() {
        let page = Arc::new(FakePage::new(google()));
        page.fail_adoption(true);
        let extraction = extract(Some(&google()));

        let resolver = ElementResolver::new(page);
        let err = resolver
            .resolve(extraction.index_map.node_ref(1), &extraction.index_map)
            .await
            .unwrap_err();
        assert!(matches!(err, ElementError::AdoptionFailed { .. }));
    }

    #[tokio::test]
    async fn test_index_from_previous_extraction_is_stale() {
        let page = Arc::new(FakePage::new(google()));
        let old = extract(Some(&google()));
        let current = extract(Some(&google()));

        let resolver = ElementResolver::new(page);
        let err = resolver
            .resolve(old.index_map.node_ref(1), &current.index_map)
            .await
            .unwrap_err();
        assert!(matches!(err, ElementError::StaleExtraction { index: 1, .. }));

        let err = resolver
            .resolve(current.index_map.node_ref(42), &current.index_map)
            .await
            .unwrap_err();
        assert!(matches!(err, ElementError::UnknownIndex(42)));
    }
}
