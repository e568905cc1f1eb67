//! Shared timing and browser constants

use std::time::Duration;

/// Chrome user agent string for stealth mode
///
/// Chrome ships a new stable roughly every four weeks; bump this quarterly.
pub const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.6834.160 Safari/537.36";

/// Pause after a DOM-mutating action so the next extraction sees its effects
pub const SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Duration of an explicit `Wait` action
pub const WAIT_DELAY: Duration = Duration::from_millis(1000);

/// Vertical distance of one `Scroll` action, in CSS pixels
pub const SCROLL_STEP_PX: i64 = 100;

/// Clicks used to select existing field content before typing
pub const SELECT_ALL_CLICKS: u32 = 3;

/// Reason attached to the terminal state when the model never answers usefully
pub const MODEL_FAILURE_REASON: &str = "Agent failed to respond";
