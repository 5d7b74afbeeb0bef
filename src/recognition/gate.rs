// SPDX-License-Identifier: GPL-3.0-only

//! Deduplication of repeated sightings
//!
//! The gate remembers only the most recent text. A sighting is a duplicate
//! when it repeats that text within the cooldown window, and every valid
//! sighting refreshes the memory. A code held steadily in front of the camera
//! therefore stays a duplicate for as long as it keeps being seen.

use super::types::RecognitionResult;
use crate::constants::DEFAULT_COOLDOWN;
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

/// How a valid result relates to recent sightings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// First sighting, or the text changed, or the cooldown lapsed
    New,
    /// Same text seen again within the cooldown window
    Duplicate,
}

/// The single remembered sighting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionMemory {
    pub last_text: String,
    pub last_seen_at: Instant,
}

#[derive(Debug)]
pub struct DedupGate {
    cooldown: Duration,
    memory: Option<DetectionMemory>,
}

impl Default for DedupGate {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN)
    }
}

impl DedupGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            memory: None,
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn memory(&self) -> Option<&DetectionMemory> {
        self.memory.as_ref()
    }

    /// Classify a result seen now
    pub fn classify(&mut self, result: &RecognitionResult) -> Classification {
        self.classify_at(result, Instant::now())
    }

    /// Classify a result seen at `now`
    ///
    /// Only meaningful for valid results. Invalid results are reported as
    /// duplicates so nothing downstream reacts to them, and they leave the
    /// memory untouched.
    pub fn classify_at(&mut self, result: &RecognitionResult, now: Instant) -> Classification {
        if !result.is_valid {
            return Classification::Duplicate;
        }

        let classification = match &self.memory {
            Some(memory)
                if memory.last_text == result.text
                    && now.saturating_duration_since(memory.last_seen_at) < self.cooldown =>
            {
                Classification::Duplicate
            }
            _ => Classification::New,
        };

        trace!(?classification, text_length = result.text.len(), "Classified detection");

        // Refreshed on every sighting, duplicate or not
        self.memory = Some(DetectionMemory {
            last_text: result.text.clone(),
            last_seen_at: now,
        });

        classification
    }

    /// Forget the last sighting
    pub fn reset(&mut self) {
        self.memory = None;
    }
}
