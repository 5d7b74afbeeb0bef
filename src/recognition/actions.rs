// SPDX-License-Identifier: GPL-3.0-only

//! Side effects of a new detection
//!
//! New detections may be copied to the clipboard and, for web links, opened
//! in the default browser. Both are opt-in through [`ActionPolicy`]; the
//! effects themselves sit behind [`AutoActions`] so sessions can run headless.

use super::content::is_openable_url;
use arboard::Clipboard;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Desktop effects triggered by a new detection
pub trait AutoActions: Send + Sync {
    fn copy_text(&self, text: &str) -> Result<(), String>;
    fn open_url(&self, url: &str) -> Result<(), String>;
}

/// Which auto-actions run for new detections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionPolicy {
    pub auto_copy: bool,
    pub auto_open_url: bool,
}

impl Default for ActionPolicy {
    fn default() -> Self {
        Self {
            auto_copy: true,
            auto_open_url: false,
        }
    }
}

/// What [`ActionPolicy::apply`] actually did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppliedActions {
    pub copied: bool,
    pub opened: bool,
}

impl ActionPolicy {
    /// Nothing is triggered
    pub const fn disabled() -> Self {
        Self {
            auto_copy: false,
            auto_open_url: false,
        }
    }

    pub const fn is_enabled(&self) -> bool {
        self.auto_copy || self.auto_open_url
    }

    /// Run the enabled actions for a new detection's text
    ///
    /// Failures are logged and reported as not done; they never propagate.
    pub fn apply(&self, actions: &dyn AutoActions, text: &str) -> AppliedActions {
        let mut applied = AppliedActions::default();

        if self.auto_copy {
            match actions.copy_text(text) {
                Ok(()) => applied.copied = true,
                Err(e) => warn!(error = %e, "Failed to copy detection to clipboard"),
            }
        }

        let url = text.trim();
        if self.auto_open_url && is_openable_url(url) {
            match actions.open_url(url) {
                Ok(()) => applied.opened = true,
                Err(e) => warn!(url = %url, error = %e, "Failed to open detected URL"),
            }
        }

        applied
    }
}

/// Clipboard and browser of the running desktop session
///
/// Calls block; sessions run them on the blocking pool. The clipboard
/// handle is opened on first use and kept so copied text outlives the call.
#[derive(Default)]
pub struct DesktopActions {
    clipboard: Mutex<Option<Clipboard>>,
}

impl DesktopActions {
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::fmt::Debug for DesktopActions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DesktopActions").finish_non_exhaustive()
    }
}

impl AutoActions for DesktopActions {
    fn copy_text(&self, text: &str) -> Result<(), String> {
        let mut clipboard = self
            .clipboard
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // A handle that failed is dropped and reopened on the next copy
        let mut handle = match clipboard.take() {
            Some(handle) => handle,
            None => Clipboard::new().map_err(|e| e.to_string())?,
        };
        handle.set_text(text).map_err(|e| e.to_string())?;
        *clipboard = Some(handle);
        debug!(chars = text.chars().count(), "Copied text to clipboard");
        Ok(())
    }

    fn open_url(&self, url: &str) -> Result<(), String> {
        info!(url = %url, "Opening URL from detection");
        open::that_detached(url).map_err(|e| e.to_string())
    }
}
