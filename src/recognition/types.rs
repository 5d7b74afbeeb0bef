// SPDX-License-Identifier: GPL-3.0-only

//! Core types flowing through the recognition pipeline
//!
//! These types are produced by the decoder adapter, carried by pipeline
//! events and consumed by the dedup gate, overlay controller and history.

use super::formats::BarcodeFormat;
use crate::constants::PLACEHOLDER_CONFIDENCE;
use crate::errors::RecognitionError;
use serde::{Deserialize, Serialize};

/// Correlates a pipeline event with the call that issued the request
pub type RequestId = u64;

/// A pixel position in source image coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// The four corners locating a symbol within an image
///
/// Corners are stored clockwise starting at the symbol's top-left, which is
/// not necessarily the image's top-left when the symbol is rotated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Quadrilateral {
    pub corners: [Point; 4],
}

impl Quadrilateral {
    pub const fn new(
        top_left: Point,
        top_right: Point,
        bottom_right: Point,
        bottom_left: Point,
    ) -> Self {
        Self {
            corners: [top_left, top_right, bottom_right, bottom_left],
        }
    }

    pub fn top_left(&self) -> Point {
        self.corners[0]
    }

    pub fn top_right(&self) -> Point {
        self.corners[1]
    }

    pub fn bottom_right(&self) -> Point {
        self.corners[2]
    }

    pub fn bottom_left(&self) -> Point {
        self.corners[3]
    }

    /// Map corners found on a downscaled image back to the source image
    pub fn scaled(&self, factor: f64) -> Self {
        let scale = |p: Point| {
            Point::new(
                (p.x as f64 * factor).round() as i32,
                (p.y as f64 * factor).round() as i32,
            )
        };
        Self {
            corners: self.corners.map(scale),
        }
    }
}

/// Decode aggressiveness for a single recognition call
///
/// `fast_mode` wins over the other flags: a fast request never tries harder
/// and never rotates, whatever the caller set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionConfig {
    pub try_harder: bool,
    pub try_rotate: bool,
    pub fast_mode: bool,
    /// Maximum number of symbols to report, at least 1
    pub max_symbols: usize,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            try_harder: false,
            try_rotate: true,
            fast_mode: false,
            max_symbols: 1,
        }
    }
}

impl RecognitionConfig {
    /// Settings for a user-triggered single capture: accuracy over speed
    pub const fn thorough() -> Self {
        Self {
            try_harder: true,
            try_rotate: true,
            fast_mode: false,
            max_symbols: 1,
        }
    }

    /// Settings for continuous camera polling: throughput over accuracy
    pub const fn continuous() -> Self {
        Self {
            try_harder: false,
            try_rotate: true,
            fast_mode: true,
            max_symbols: 1,
        }
    }

    pub fn with_max_symbols(mut self, max_symbols: usize) -> Self {
        self.max_symbols = max_symbols.max(1);
        self
    }

    /// `try_harder` after applying fast mode
    pub fn effective_try_harder(&self) -> bool {
        self.try_harder && !self.fast_mode
    }

    /// `try_rotate` after applying fast mode
    pub fn effective_try_rotate(&self) -> bool {
        self.try_rotate && !self.fast_mode
    }

    /// `max_symbols` with the lower bound applied
    pub fn effective_max_symbols(&self) -> usize {
        self.max_symbols.max(1)
    }
}

/// Outcome of recognizing one image
///
/// An invalid result (`is_valid == false`) means no symbol was found; its
/// text, format and position carry no meaning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResult {
    pub text: String,
    pub is_valid: bool,
    pub position: Quadrilateral,
    pub format: BarcodeFormat,
    /// Confidence score (0.0 to 1.0)
    pub confidence: f32,
}

impl RecognitionResult {
    /// A successful match with the placeholder confidence
    pub fn new(text: impl Into<String>, format: BarcodeFormat, position: Quadrilateral) -> Self {
        Self {
            text: text.into(),
            is_valid: true,
            position,
            format,
            confidence: PLACEHOLDER_CONFIDENCE,
        }
    }

    /// The "no symbol found" result
    pub fn invalid() -> Self {
        Self {
            text: String::new(),
            is_valid: false,
            position: Quadrilateral::default(),
            format: BarcodeFormat::Unknown,
            confidence: 0.0,
        }
    }
}

/// Events delivered to every pipeline subscriber
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionEvent {
    /// The request was processed; the result may be invalid (nothing found)
    Completed {
        result: RecognitionResult,
        request_id: RequestId,
    },
    /// The request was rejected or the decoder failed
    Failed {
        error: RecognitionError,
        request_id: RequestId,
    },
}

impl RecognitionEvent {
    pub fn request_id(&self) -> RequestId {
        match self {
            Self::Completed { request_id, .. } | Self::Failed { request_id, .. } => *request_id,
        }
    }

    /// The failure carried by a `Failed` event
    pub fn error(&self) -> Option<&RecognitionError> {
        match self {
            Self::Failed { error, .. } => Some(error),
            Self::Completed { .. } => None,
        }
    }
}
