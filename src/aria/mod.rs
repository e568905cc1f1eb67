//! Accessibility tree extraction
//!
//! Compresses a raw accessibility snapshot into the indexed tree the model
//! reasons over, plus the per-extraction index map used to find nodes again.

mod extractor;
mod index_map;
mod tree;

pub use extractor::{AxSnapshotNode, Extraction, extract};
pub use index_map::{ExtractionId, IndexMap, LookupError, NodeEntry, NodeRef};
pub use tree::{AriaNode, CompositeRef, TreeError, parse_tree, serialize_tree};
