// SPDX-License-Identifier: GPL-3.0-only

//! Overlay lifecycle
//!
//! Tracks the annotation drawn around the most recent new detection. The
//! dismissal deadline is derived from the recognition cadence
//! ([`overlay_timeout`]) so the box stays up until roughly the next
//! recognition attempt. The controller only computes state and deadlines;
//! the owner waits on [`OverlayController::deadline`] and calls
//! [`OverlayController::poll_at`] when it passes.

use super::types::RecognitionResult;
use crate::constants::{DEFAULT_RECOGNITION_INTERVAL, overlay_timeout};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

/// The overlay currently on screen
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayState {
    pub visible: bool,
    pub attached_result: RecognitionResult,
    pub dismiss_at: Instant,
}

#[derive(Debug)]
pub struct OverlayController {
    enabled: bool,
    recognition_interval: Duration,
    state: Option<OverlayState>,
}

impl Default for OverlayController {
    fn default() -> Self {
        Self::new(true, DEFAULT_RECOGNITION_INTERVAL)
    }
}

impl OverlayController {
    pub fn new(enabled: bool, recognition_interval: Duration) -> Self {
        Self {
            enabled,
            recognition_interval,
            state: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enable or disable overlay display; disabling hides immediately
    ///
    /// Returns `true` when a visible overlay was hidden.
    pub fn set_enabled(&mut self, enabled: bool) -> bool {
        self.enabled = enabled;
        if !enabled {
            return self.hide();
        }
        false
    }

    pub fn recognition_interval(&self) -> Duration {
        self.recognition_interval
    }

    /// Record a new cadence for future `show` calls
    ///
    /// A dismissal that is already scheduled keeps its deadline.
    pub fn on_interval_changed(&mut self, interval: Duration) {
        trace!(interval_ms = interval.as_millis(), "Overlay interval changed");
        self.recognition_interval = interval;
    }

    /// Show the overlay at the current cadence
    pub fn show_at(&mut self, result: &RecognitionResult, now: Instant) -> Option<Instant> {
        self.show_with_interval_at(result, self.recognition_interval, now)
    }

    /// Show the overlay, replacing any pending dismissal
    ///
    /// Returns the new dismissal deadline, or `None` when overlay display is
    /// disabled or the result is invalid.
    pub fn show_with_interval_at(
        &mut self,
        result: &RecognitionResult,
        recognition_interval: Duration,
        now: Instant,
    ) -> Option<Instant> {
        if !self.enabled || !result.is_valid {
            return None;
        }

        let timeout = overlay_timeout(recognition_interval);
        let dismiss_at = now + timeout;
        self.state = Some(OverlayState {
            visible: true,
            attached_result: result.clone(),
            dismiss_at,
        });

        debug!(
            timeout_ms = timeout.as_millis(),
            format = %result.format,
            "Overlay shown"
        );
        Some(dismiss_at)
    }

    /// Hide immediately and cancel the pending dismissal
    ///
    /// Returns `true` if an overlay was visible.
    pub fn hide(&mut self) -> bool {
        let was_visible = self.is_visible();
        self.state = None;
        was_visible
    }

    /// Fire the dismissal if its deadline has passed
    ///
    /// Returns `true` exactly once per shown overlay, when it is dismissed.
    pub fn poll_at(&mut self, now: Instant) -> bool {
        match &self.state {
            Some(state) if now >= state.dismiss_at => {
                trace!("Overlay dismissed by timer");
                self.state = None;
                true
            }
            _ => false,
        }
    }

    /// Pending dismissal deadline, if an overlay is visible
    pub fn deadline(&self) -> Option<Instant> {
        self.state.as_ref().map(|s| s.dismiss_at)
    }

    pub fn is_visible(&self) -> bool {
        self.state.as_ref().is_some_and(|s| s.visible)
    }

    pub fn state(&self) -> Option<&OverlayState> {
        self.state.as_ref()
    }
}
