// SPDX-License-Identifier: GPL-3.0-only

//! Pipeline-wide constants and defaults

use std::time::Duration;

/// Default maximum number of pending recognition requests
///
/// The smallest depth seen in practice. Older frames are dropped first, so a
/// shallow queue keeps results close to what the camera currently shows.
pub const DEFAULT_QUEUE_DEPTH: usize = 3;

/// Default scheduler tick while requests are pending
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Default camera polling cadence
pub const DEFAULT_RECOGNITION_INTERVAL: Duration = Duration::from_millis(500);

/// Fastest user-selectable camera polling cadence
pub const MIN_RECOGNITION_INTERVAL: Duration = Duration::from_millis(100);

/// Slowest user-selectable camera polling cadence
pub const MAX_RECOGNITION_INTERVAL: Duration = Duration::from_millis(2000);

/// Window during which an identical text counts as a repeat sighting
pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(2000);

/// Frames larger than this (either side, in pixels) are downscaled before decoding
pub const MAX_DECODE_DIMENSION: u32 = 1920;

/// Fixed part of the overlay timeout, added to two recognition intervals
pub const OVERLAY_GRACE: Duration = Duration::from_millis(1000);

/// Confidence reported for every match
///
/// Decoders behind [`crate::recognition::BarcodeReader`] do not report a
/// confidence score.
pub const PLACEHOLDER_CONFIDENCE: f32 = 1.0;

/// Log one "no symbol" diagnostic per this many idle results
pub const NO_SYMBOL_LOG_EVERY: u64 = 50;

/// Log one failure diagnostic per this many failed requests
pub const FAILURE_LOG_EVERY: u64 = 10;

/// Log one submission diagnostic per this many continuous frames
pub const SUBMIT_LOG_EVERY: u64 = 20;

/// Oldest history entries are dropped beyond this many
pub const MAX_HISTORY_ENTRIES: usize = 1000;

/// Buffer size of the recognition event broadcast channel
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Timeout for an overlay shown at the given recognition cadence
///
/// The overlay must outlive the next recognition attempt, so the timeout
/// scales with the interval instead of being a fixed wall-clock duration.
pub fn overlay_timeout(recognition_interval: Duration) -> Duration {
    recognition_interval * 2 + OVERLAY_GRACE
}

/// Clamp a user-provided polling cadence to the supported range
pub fn clamp_recognition_interval(interval: Duration) -> Duration {
    interval.clamp(MIN_RECOGNITION_INTERVAL, MAX_RECOGNITION_INTERVAL)
}
