//! Browser instance manager
//!
//! Owns at most one Chrome process and hands out pages on it.
//!
//! Must use `tokio::sync::Mutex`: the guard is held across CDP awaits during
//! launch and recovery.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::BrowserConfig;
use crate::browser::{BrowserWrapper, CdpPage, launch_browser};

/// Lazily launched browser with health checking and crash recovery
///
/// Every [`BrowserManager::new_page`] first checks the browser with a
/// `Browser.getVersion` round trip; a dead browser is cleaned up and
/// relaunched transparently.
pub struct BrowserManager {
    config: BrowserConfig,
    browser: Arc<Mutex<Option<BrowserWrapper>>>,
}

impl BrowserManager {
    pub fn new(config: BrowserConfig) -> Self {
        Self {
            config,
            browser: Arc::new(Mutex::new(None)),
        }
    }

    /// Make sure a healthy browser is running
    pub async fn get_or_launch(&self) -> Result<Arc<Mutex<Option<BrowserWrapper>>>> {
        let mut guard = self.browser.lock().await;

        if let Some(wrapper) = guard.as_ref() {
            match wrapper.browser().version().await {
                Ok(_) => {
                    debug!("Browser health check passed, reusing existing browser");
                    drop(guard);
                    return Ok(self.browser.clone());
                }
                Err(e) => {
                    warn!("Browser health check failed: {}. Triggering recovery...", e);
                    if let Some(mut crashed) = guard.take() {
                        // Process may already be gone
                        let _ = crashed.browser_mut().close().await;
                        let _ = crashed.browser_mut().wait().await;
                        crashed.cleanup_temp_dir();
                    }
                }
            }
        }

        info!("Launching browser (first time or after recovery)");
        let (browser, handler, user_data_dir) = launch_browser(&self.config).await?;
        *guard = Some(BrowserWrapper::new(browser, handler, user_data_dir));
        drop(guard);

        Ok(self.browser.clone())
    }

    /// Open a new tab at `url`
    pub async fn new_page(&self, url: &str) -> Result<CdpPage> {
        let browser = self.get_or_launch().await?;
        let guard = browser.lock().await;
        let wrapper = guard
            .as_ref()
            .context("Browser disappeared right after launch")?;
        let page = wrapper
            .browser()
            .new_page(url)
            .await
            .with_context(|| format!("Failed to open {url}"))?;
        Ok(CdpPage::new(page))
    }

    /// Close the browser process and remove its profile; safe to call repeatedly
    ///
    /// `close()` alone leaves a zombie; `wait()` reaps the process.
    pub async fn shutdown(&self) -> Result<()> {
        let mut guard = self.browser.lock().await;

        if let Some(mut wrapper) = guard.take() {
            info!("Shutting down browser");

            if let Err(e) = wrapper.browser_mut().close().await {
                warn!("Failed to close browser cleanly: {}", e);
            }
            if let Err(e) = wrapper.browser_mut().wait().await {
                warn!("Failed to wait for browser exit: {}", e);
            }
            wrapper.cleanup_temp_dir();
        }

        Ok(())
    }

    pub async fn is_browser_running(&self) -> bool {
        self.browser.lock().await.is_some()
    }
}
