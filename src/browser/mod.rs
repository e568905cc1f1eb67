//! Browser infrastructure: Chrome lifecycle, the page seam and element resolution

mod cdp;
mod resolver;
mod snapshot;
mod wrapper;

pub use crate::browser_setup::{download_managed_browser, find_browser_executable};
pub use cdp::CdpPage;
pub use resolver::{ElementError, ElementResolver};
pub use snapshot::{AxRecord, nest_ax_records};
pub use wrapper::{BrowserWrapper, launch_browser};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::aria::AxSnapshotNode;

#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("Failed to find browser executable: {0}")]
    NotFound(String),

    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    #[error("Failed to create page: {0}")]
    PageCreationFailed(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("CDP command failed: {0}")]
    Cdp(String),

    #[error("IO error: {0}")]
    IoError(String),
}

pub type BrowserResult<T> = Result<T, BrowserError>;

/// One accessibility node returned by a structural query
#[derive(Debug, Clone, PartialEq)]
pub struct AxMatch {
    pub role: String,
    pub name: String,
    pub backend_node_id: Option<i64>,
}

/// Live handle to a DOM element adopted into the page's main world
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementHandle {
    pub backend_node_id: i64,
    pub object_id: String,
}

/// Browser automation provider for a single page
///
/// Implemented by [`CdpPage`] on top of chromiumoxide; tests substitute an
/// in-memory page.
#[async_trait]
pub trait BrowserPage: Send + Sync {
    async fn goto(&self, url: &str) -> BrowserResult<()>;

    async fn url(&self) -> BrowserResult<String>;

    /// Nested accessibility snapshot of the whole document, `None` when empty
    async fn accessibility_snapshot(&self) -> BrowserResult<Option<AxSnapshotNode>>;

    /// Accessibility nodes under the document root matching `role` and `name`
    async fn query_accessibility(&self, role: &str, name: &str) -> BrowserResult<Vec<AxMatch>>;

    /// Materialize a backend node as an actionable handle
    async fn adopt_backend_node(&self, backend_node_id: i64) -> BrowserResult<ElementHandle>;

    async fn click(&self, element: &ElementHandle, click_count: u32) -> BrowserResult<()>;

    async fn hover(&self, element: &ElementHandle) -> BrowserResult<()>;

    /// Insert text at the current focus
    async fn type_text(&self, text: &str) -> BrowserResult<()>;

    async fn press_key(&self, key: &str) -> BrowserResult<()>;

    async fn go_back(&self) -> BrowserResult<()>;

    async fn scroll_by(&self, dx: i64, dy: i64) -> BrowserResult<()>;

    async fn evaluate(&self, expression: &str) -> BrowserResult<Value>;

    /// Full serialized HTML of the current document
    async fn content(&self) -> BrowserResult<String>;

    async fn screenshot(&self) -> BrowserResult<Vec<u8>>;

    async fn close(&self) -> BrowserResult<()>;
}
