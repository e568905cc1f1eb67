use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::action::{BrowserAction, ContentType, ScrollDirection};
use crate::aria::IndexMap;
use crate::browser::{BrowserError, BrowserPage, ElementError, ElementResolver};
use crate::inventory::Inventory;
use crate::utils::constants::{SCROLL_STEP_PX, SELECT_ALL_CLICKS, SETTLE_DELAY, WAIT_DELAY};

#[derive(Error, Debug)]
pub enum ActionError {
    #[error("Unknown action")]
    UnknownAction,

    #[error(transparent)]
    Element(#[from] ElementError),

    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),
}

/// What to do with the rest of a batch once an action fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchPolicy {
    #[default]
    ContinueOnError,
    AbortOnFirstError,
}

/// Side output of a successful action
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionOutcome {
    pub extracted_content: Option<String>,
}

/// Result of executing an action within a batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub action: BrowserAction,
    pub success: bool,
    pub extracted_content: Option<String>,
    pub error: Option<String>,
}

/// Applies typed actions to the page behind one extraction's index map
#[derive(Clone)]
pub struct ActionExecutor {
    page: Arc<dyn BrowserPage>,
    resolver: ElementResolver,
}

impl ActionExecutor {
    pub fn new(page: Arc<dyn BrowserPage>) -> Self {
        Self {
            resolver: ElementResolver::new(page.clone()),
            page,
        }
    }

    /// Apply a single action
    ///
    /// `Type` is the only path where masked inventory placeholders are turned
    /// back into real values.
    pub async fn apply(
        &self,
        action: &BrowserAction,
        map: &IndexMap,
        inventory: Option<&Inventory>,
    ) -> Result<ActionOutcome, ActionError> {
        match action {
            BrowserAction::Click { index } => {
                let element = self.resolver.resolve(map.node_ref(*index), map).await?;
                self.page.click(&element, 1).await?;
                tokio::time::sleep(SETTLE_DELAY).await;
            }
            BrowserAction::Type { index, text } => {
                let element = self.resolver.resolve(map.node_ref(*index), map).await?;
                let text = match inventory {
                    Some(inventory) => inventory.replace_mask(text),
                    None => text.clone(),
                };
                self.page.click(&element, SELECT_ALL_CLICKS).await?;
                self.page.type_text(&text).await?;
                self.page.press_key("Enter").await?;
                tokio::time::sleep(SETTLE_DELAY).await;
            }
            BrowserAction::Back => {
                self.page.go_back().await?;
                tokio::time::sleep(SETTLE_DELAY).await;
            }
            BrowserAction::Wait => {
                tokio::time::sleep(WAIT_DELAY).await;
            }
            BrowserAction::Hover { index } => {
                let element = self.resolver.resolve(map.node_ref(*index), map).await?;
                self.page.hover(&element).await?;
            }
            BrowserAction::Scroll { direction } => {
                let dy = match direction {
                    ScrollDirection::Up => -SCROLL_STEP_PX,
                    ScrollDirection::Down => SCROLL_STEP_PX,
                };
                self.page.scroll_by(0, dy).await?;
            }
            BrowserAction::GoTo { url } => {
                self.page.goto(url).await?;
            }
            BrowserAction::Get {
                request,
                content_type,
            } => {
                let content = self.extract_content(*content_type).await?;
                debug!(
                    "Extracted {} characters for request '{}'",
                    content.len(),
                    request
                );
                return Ok(ActionOutcome {
                    extracted_content: Some(content),
                });
            }
            BrowserAction::Unknown => return Err(ActionError::UnknownAction),
        }
        Ok(ActionOutcome::default())
    }

    /// Execute a batch strictly in order
    ///
    /// Failures are recorded in the returned results; with
    /// [`BatchPolicy::AbortOnFirstError`] the remaining actions are skipped.
    pub async fn perform_many(
        &self,
        actions: &[BrowserAction],
        map: &IndexMap,
        inventory: Option<&Inventory>,
        policy: BatchPolicy,
    ) -> Vec<ActionResult> {
        let mut results = Vec::with_capacity(actions.len());

        for action in actions {
            match self.apply(action, map, inventory).await {
                Ok(outcome) => {
                    info!("Action {} succeeded", action.kind());
                    results.push(ActionResult {
                        action: action.clone(),
                        success: true,
                        extracted_content: outcome.extracted_content,
                        error: None,
                    });
                }
                Err(e) => {
                    warn!("Action {} failed: {}", action.kind(), e);
                    results.push(ActionResult {
                        action: action.clone(),
                        success: false,
                        extracted_content: None,
                        error: Some(e.to_string()),
                    });
                    if policy == BatchPolicy::AbortOnFirstError {
                        break;
                    }
                }
            }
        }

        results
    }

    async fn extract_content(&self, content_type: ContentType) -> Result<String, BrowserError> {
        match content_type {
            ContentType::Text => {
                let value = self
                    .page
                    .evaluate("document.body ? document.body.innerText : ''")
                    .await?;
                Ok(value.as_str().unwrap_or_default().to_string())
            }
            ContentType::Html => self.page.content().await,
            ContentType::Markdown => {
                let html = self.page.content().await?;
                Ok(html2md::parse_html(&html))
            }
        }
    }
}
