// SPDX-License-Identifier: GPL-3.0-only

//! Capture orchestration
//!
//! Entry point for frame sources. Continuous camera frames go through the
//! bounded queue with the fast configuration; manual captures and batch
//! files bypass the queue and decode immediately with the thorough one.
//! Request ids come from a counter owned by the orchestrator and are never
//! reused.

use super::decoder::DecoderAdapter;
use super::pipeline::RecognitionPipeline;
use super::types::{RecognitionConfig, RecognitionEvent, RecognitionResult, RequestId};
use crate::constants::SUBMIT_LOG_EVERY;
use crate::errors::RecognitionError;
use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, trace, warn};

/// What a manual capture found
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    Found(RecognitionResult),
    NoCodeFound,
    Failed(RecognitionError),
}

impl CaptureOutcome {
    fn from_decode(outcome: Result<RecognitionResult, RecognitionError>) -> Self {
        match outcome {
            Ok(result) if result.is_valid => Self::Found(result),
            Ok(_) => Self::NoCodeFound,
            Err(e) => Self::Failed(e),
        }
    }

    pub fn result(&self) -> Option<&RecognitionResult> {
        match self {
            Self::Found(result) => Some(result),
            _ => None,
        }
    }

    /// User-facing message for outcomes without a result
    pub fn message(&self) -> Option<String> {
        match self {
            Self::Found(_) => None,
            Self::NoCodeFound => Some("no code found in frame".to_string()),
            Self::Failed(e) => Some(format!("recognition error: {}", e)),
        }
    }
}

/// Id given to a submitted frame and whether it entered the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submission {
    pub request_id: RequestId,
    /// `false` when the image was rejected or the pipeline is shut down
    pub queued: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ManualCapture {
    pub request_id: RequestId,
    pub outcome: CaptureOutcome,
}

/// Per-file result of [`CaptureOrchestrator::capture_batch`]
#[derive(Debug, Clone, PartialEq)]
pub struct BatchItem {
    pub path: PathBuf,
    pub request_id: Option<RequestId>,
    pub outcome: CaptureOutcome,
}

/// Remembers the one request a consumer is waiting for
///
/// Events for any other id are stale (an older request, or another
/// consumer's) and must be ignored.
#[derive(Debug, Default)]
pub struct RequestTracker {
    outstanding: Option<RequestId>,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for `request_id`, superseding any earlier request
    pub fn track(&mut self, request_id: RequestId) {
        if let Some(previous) = self.outstanding.replace(request_id) {
            trace!(previous, request_id, "Superseded outstanding request");
        }
    }

    pub fn outstanding(&self) -> Option<RequestId> {
        self.outstanding
    }

    pub fn accepts(&self, event: &RecognitionEvent) -> bool {
        self.outstanding == Some(event.request_id())
    }

    /// Accept the event if it answers the outstanding request
    ///
    /// Returns `true` and stops tracking when it does.
    pub fn settle(&mut self, event: &RecognitionEvent) -> bool {
        if self.accepts(event) {
            self.outstanding = None;
            true
        } else {
            false
        }
    }

    pub fn clear(&mut self) {
        self.outstanding = None;
    }
}

/// Load an image file for recognition
pub fn load_image(path: &Path) -> Result<DynamicImage, RecognitionError> {
    image::open(path).map_err(|e| RecognitionError::ImageLoad {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

#[derive(Debug)]
pub struct CaptureOrchestrator {
    pipeline: Arc<RecognitionPipeline>,
    next_id: AtomicU64,
    submitted: AtomicU64,
}

impl CaptureOrchestrator {
    pub fn new(pipeline: Arc<RecognitionPipeline>) -> Self {
        Self {
            pipeline,
            next_id: AtomicU64::new(1),
            submitted: AtomicU64::new(0),
        }
    }

    pub fn pipeline(&self) -> &Arc<RecognitionPipeline> {
        &self.pipeline
    }

    fn adapter(&self) -> DecoderAdapter {
        self.pipeline.adapter().clone()
    }

    /// Allocate a fresh request id
    pub fn next_request_id(&self) -> RequestId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Queue an image under a fresh id
    ///
    /// The id is returned whether or not the image was queued; a rejected
    /// image's `Failed` event carries the same id.
    pub fn submit(&self, image: DynamicImage, config: RecognitionConfig) -> Submission {
        let request_id = self.next_request_id();
        let queued = self.pipeline.enqueue(request_id, image, config);
        Submission { request_id, queued }
    }

    /// Feed one camera frame into the queue
    pub fn capture_continuous(&self, image: DynamicImage) -> Submission {
        let submitted = self.submitted.fetch_add(1, Ordering::Relaxed) + 1;
        if submitted % SUBMIT_LOG_EVERY == 0 {
            debug!(
                submitted,
                pending = self.pipeline.pending(),
                "Submitting continuous frames"
            );
        }
        self.submit(image, RecognitionConfig::continuous())
    }

    /// Decode a user-triggered capture immediately, off the async thread
    pub async fn capture_manual(&self, image: DynamicImage) -> ManualCapture {
        let request_id = self.next_request_id();
        let adapter = self.adapter();

        let decoded = tokio::task::spawn_blocking(move || {
            adapter.decode_single(&image, &RecognitionConfig::thorough())
        })
        .await
        .unwrap_or_else(|e| {
            warn!(request_id, error = %e, "Manual capture task failed");
            Err(RecognitionError::Decode(format!("recognition task failed: {}", e)))
        });

        let capture = ManualCapture {
            request_id,
            outcome: CaptureOutcome::from_decode(decoded),
        };
        log_manual(&capture);
        capture
    }

    /// Every symbol in a capture, ranked, with the thorough configuration
    pub async fn capture_manual_all(
        &self,
        image: DynamicImage,
    ) -> Result<Vec<RecognitionResult>, RecognitionError> {
        let adapter = self.adapter();
        let config = RecognitionConfig::thorough().with_max_symbols(usize::MAX);

        tokio::task::spawn_blocking(move || adapter.decode_multi(&image, &config))
            .await
            .map_err(|e| RecognitionError::Decode(format!("recognition task failed: {}", e)))?
    }

    /// Manual capture of each file in order
    ///
    /// Files that cannot be read are reported individually; the batch always
    /// covers every path.
    pub async fn capture_batch(&self, paths: &[PathBuf]) -> Vec<BatchItem> {
        let mut items = Vec::with_capacity(paths.len());

        for path in paths {
            let loaded = {
                let path = path.clone();
                tokio::task::spawn_blocking(move || load_image(&path))
                    .await
                    .unwrap_or_else(|e| {
                        Err(RecognitionError::Decode(format!("image loader failed: {}", e)))
                    })
            };

            let item = match loaded {
                Ok(image) => {
                    let capture = self.capture_manual(image).await;
                    BatchItem {
                        path: path.clone(),
                        request_id: Some(capture.request_id),
                        outcome: capture.outcome,
                    }
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable image");
                    BatchItem {
                        path: path.clone(),
                        request_id: None,
                        outcome: CaptureOutcome::Failed(e),
                    }
                }
            };
            items.push(item);
        }

        let found = items.iter().filter(|i| i.outcome.result().is_some()).count();
        info!(files = items.len(), found, "Batch recognition finished");
        items
    }

    /// Queue an image and wait for its own event
    ///
    /// Returns `None` when the request was evicted (no event ever arrives
    /// and `wait` elapses), the pipeline shut down, or the channel closed.
    /// A scheduler must be driving the pipeline.
    pub async fn recognize_queued(
        &self,
        image: DynamicImage,
        config: RecognitionConfig,
        wait: Duration,
    ) -> Option<RecognitionEvent> {
        // Subscribe first so an immediate rejection is not missed
        let mut events = self.pipeline.subscribe();
        let request_id = self.next_request_id();
        let mut tracker = RequestTracker::new();
        tracker.track(request_id);

        if !self.pipeline.enqueue(request_id, image, config) && self.pipeline.is_shut_down() {
            return None;
        }

        let waiting = async {
            loop {
                match events.recv().await {
                    Ok(event) if tracker.settle(&event) => return Some(event),
                    Ok(event) => {
                        trace!(request_id, stale = event.request_id(), "Ignoring stale event")
                    }
                    Err(RecvError::Lagged(missed)) => {
                        debug!(missed, "Event receiver lagged");
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        };

        match tokio::time::timeout(wait, waiting).await {
            Ok(event) => event,
            Err(_) => {
                debug!(request_id, "No event for queued request, presumed evicted");
                None
            }
        }
    }
}

fn log_manual(capture: &ManualCapture) {
    match &capture.outcome {
        CaptureOutcome::Found(result) => info!(
            request_id = capture.request_id,
            format = %result.format,
            "Manual capture found a code"
        ),
        CaptureOutcome::NoCodeFound => {
            info!(request_id = capture.request_id, "Manual capture found no code")
        }
        CaptureOutcome::Failed(e) => {
            warn!(request_id = capture.request_id, error = %e, "Manual capture failed")
        }
    }
}
