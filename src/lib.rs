// SPDX-License-Identifier: GPL-3.0-only

//! qrscan - barcode recognition for camera frames and still images
//!
//! # Architecture
//!
//! - [`recognition`]: request queue, decoder adapter, ranking, dedup gate,
//!   overlay lifecycle and the capture orchestrator
//! - [`config`]: user configuration handling
//! - [`constants`]: defaults and tuning values
//! - [`errors`]: error types
//!
//! # Example
//!
//! ```no_run
//! use qrscan::recognition::{CaptureOrchestrator, DecoderAdapter, RecognitionPipeline, RqrrReader};
//! use std::sync::Arc;
//!
//! # async fn demo(frame: image::DynamicImage) {
//! let adapter = DecoderAdapter::new(Arc::new(RqrrReader));
//! let pipeline = Arc::new(RecognitionPipeline::new(adapter, Default::default()));
//! let orchestrator = CaptureOrchestrator::new(pipeline);
//! let capture = orchestrator.capture_manual(frame).await;
//! println!("{:?}", capture.outcome);
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod errors;
pub mod recognition;

// Re-export commonly used types
pub use config::Config;
pub use errors::{AppError, AppResult, ConfigError, RecognitionError};
pub use recognition::{
    BarcodeFormat, CaptureOrchestrator, RecognitionEvent, RecognitionPipeline, RecognitionResult,
    ScanSession, Scheduler,
};
