//! Browser lifecycle management
//!
//! Pairs a chromiumoxide browser with its event handler task and the temporary
//! profile directory it was launched with.

use anyhow::Result;
use chromiumoxide::browser::Browser;
use std::path::PathBuf;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::BrowserConfig;

/// Wrapper for Browser and its event handler task
///
/// The handler MUST be aborted when the browser goes away, otherwise it keeps
/// polling a dead websocket forever.
pub struct BrowserWrapper {
    browser: Browser,
    handler: JoinHandle<()>,
    user_data_dir: Option<PathBuf>,
}

impl BrowserWrapper {
    pub(crate) fn new(browser: Browser, handler: JoinHandle<()>, user_data_dir: PathBuf) -> Self {
        Self {
            browser,
            handler,
            user_data_dir: Some(user_data_dir),
        }
    }

    pub(crate) fn browser(&self) -> &Browser {
        &self.browser
    }

    pub(crate) fn browser_mut(&mut self) -> &mut Browser {
        &mut self.browser
    }

    /// Remove the profile directory
    ///
    /// Call only after `browser.wait()` has returned; Chrome keeps file
    /// handles open until the process exits.
    pub fn cleanup_temp_dir(&mut self) {
        if let Some(path) = self.user_data_dir.take() {
            info!("Cleaning up temp directory: {}", path.display());
            if let Err(e) = std::fs::remove_dir_all(&path) {
                warn!(
                    "Failed to clean up temp directory {}: {}. Manual cleanup may be required.",
                    path.display(),
                    e
                );
            }
        }
    }
}

impl Drop for BrowserWrapper {
    fn drop(&mut self) {
        info!("Dropping BrowserWrapper - aborting handler task");
        self.handler.abort();

        if let Some(path) = self.user_data_dir.as_ref() {
            warn!(
                "BrowserWrapper dropped without explicit cleanup. \
                Temp directory will be orphaned: {}. \
                Call BrowserManager::shutdown() before dropping to ensure proper cleanup.",
                path.display()
            );
        }
    }
}

/// Launch a browser with a profile directory unique to this process
///
/// Returns the browser, its handler task and the profile directory that must
/// be cleaned up after shutdown.
pub async fn launch_browser(config: &BrowserConfig) -> Result<(Browser, JoinHandle<()>, PathBuf)> {
    info!("Launching browser instance");

    let user_data_dir = std::env::temp_dir().join(format!(
        "aria_pilot_profile_{}_{}",
        std::process::id(),
        uuid::Uuid::new_v4().simple()
    ));

    let (browser, handler) =
        crate::browser_setup::launch_browser(config, Some(user_data_dir.clone())).await?;

    Ok((browser, handler, user_data_dir))
}
