// SPDX-License-Identifier: GPL-3.0-only

//! Asynchronous barcode recognition
//!
//! Frames enter through [`CaptureOrchestrator`]. Continuous frames are queued
//! in a bounded [`RequestQueue`] that a [`Scheduler`] drains one request at a
//! time; results are broadcast as [`RecognitionEvent`]s. A [`ScanSession`]
//! consumes the events, suppresses repeats with a [`DedupGate`], records a
//! [`DetectionHistory`] and drives the [`OverlayController`].
//!
//! Manual captures skip the queue and are decoded straight away with the
//! thorough configuration.

pub mod actions;
pub mod content;
pub mod decoder;
pub mod formats;
pub mod gate;
pub mod history;
pub mod orchestrator;
pub mod overlay;
pub mod pipeline;
pub mod queue;
pub mod ranking;
pub mod readers;
pub mod scheduler;
pub mod session;
pub mod types;

pub use actions::{ActionPolicy, AppliedActions, AutoActions, DesktopActions};
pub use content::{ContentKind, is_openable_url};
pub use decoder::{BarcodeReader, DecodeOptions, DecoderAdapter, RawBarcode};
pub use formats::BarcodeFormat;
pub use gate::{Classification, DedupGate, DetectionMemory};
pub use history::{DetectionHistory, HistoryEntry, HistoryMarker, default_export_name};
pub use orchestrator::{
    BatchItem, CaptureOrchestrator, CaptureOutcome, ManualCapture, RequestTracker, Submission,
    load_image,
};
pub use overlay::{OverlayController, OverlayState};
pub use pipeline::{PipelineSettings, RecognitionPipeline};
pub use queue::{RecognitionRequest, RequestQueue};
pub use readers::RqrrReader;
pub use scheduler::Scheduler;
pub use session::{ScanSession, SessionSettings, SessionUpdate};
pub use types::{
    Point, Quadrilateral, RecognitionConfig, RecognitionEvent, RecognitionResult, RequestId,
};
