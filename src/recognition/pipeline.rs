// SPDX-License-Identifier: GPL-3.0-only

//! Recognition pipeline
//!
//! Owns the request queue, the decoder adapter and the event channel.
//!
//! ```text
//! enqueue ─► RequestQueue ─► tick() ─► DecoderAdapter ─► broadcast
//!                 ▲                                        │
//!             (evicts oldest)                  Completed / Failed
//! ```
//!
//! `tick()` processes at most one request and never runs two decodes at
//! once. It is driven by [`super::Scheduler`] in production and called
//! directly in tests.

use super::decoder::{DecoderAdapter, validate_image};
use super::queue::{RecognitionRequest, RequestQueue};
use super::types::{RecognitionConfig, RecognitionEvent, RequestId};
use crate::constants::{
    DEFAULT_QUEUE_DEPTH, DEFAULT_TICK_INTERVAL, EVENT_CHANNEL_CAPACITY, FAILURE_LOG_EVERY,
    MAX_DECODE_DIMENSION, NO_SYMBOL_LOG_EVERY,
};
use image::DynamicImage;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{Notify, broadcast};
use tracing::{debug, info, trace, warn};

/// Queue and scheduler settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Maximum number of pending requests
    pub queue_depth: usize,
    /// Delay between scheduler ticks while requests are pending
    pub tick_interval: Duration,
    /// Frames larger than this are downscaled before decoding
    pub max_decode_dimension: u32,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            queue_depth: DEFAULT_QUEUE_DEPTH,
            tick_interval: DEFAULT_TICK_INTERVAL,
            max_decode_dimension: MAX_DECODE_DIMENSION,
        }
    }
}

pub struct RecognitionPipeline {
    queue: Mutex<RequestQueue>,
    adapter: DecoderAdapter,
    events: broadcast::Sender<RecognitionEvent>,
    /// Wakes a suspended scheduler after an enqueue or on shutdown
    wake: Notify,
    shutdown: AtomicBool,
    tick_interval: Duration,
    idle_results: AtomicU64,
    failures: AtomicU64,
}

impl std::fmt::Debug for RecognitionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecognitionPipeline")
            .field("pending", &self.pending())
            .field("tick_interval", &self.tick_interval)
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}

/// Clears the in-flight flag even if decoding unwinds
struct InFlight<'a> {
    queue: &'a Mutex<RequestQueue>,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .finish();
    }
}

impl RecognitionPipeline {
    pub fn new(adapter: DecoderAdapter, settings: PipelineSettings) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let adapter = adapter.with_max_dimension(settings.max_decode_dimension);

        info!(
            queue_depth = settings.queue_depth,
            tick_ms = settings.tick_interval.as_millis(),
            max_dimension = adapter.max_dimension(),
            "Recognition pipeline created"
        );

        Self {
            queue: Mutex::new(RequestQueue::new(settings.queue_depth)),
            adapter,
            events,
            wake: Notify::new(),
            shutdown: AtomicBool::new(false),
            tick_interval: settings.tick_interval,
            idle_results: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Receive every `Completed`/`Failed` event emitted after this call
    pub fn subscribe(&self) -> broadcast::Receiver<RecognitionEvent> {
        self.events.subscribe()
    }

    pub fn adapter(&self) -> &DecoderAdapter {
        &self.adapter
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Queue an image for recognition under the given id
    ///
    /// Never blocks. An empty image is rejected with an immediate `Failed`
    /// event and `false` is returned. When the queue is full the oldest
    /// request is dropped silently: it will never produce an event.
    pub fn enqueue(
        &self,
        request_id: RequestId,
        image: DynamicImage,
        config: RecognitionConfig,
    ) -> bool {
        let validated = validate_image(&image);

        // Emitting and queueing happen under the queue lock so they cannot
        // interleave with shutdown
        let mut queue = self.lock_queue();
        if self.is_shut_down() {
            debug!(request_id, "Pipeline shut down, request ignored");
            return false;
        }

        if let Err(error) = validated {
            debug!(request_id, error = %error, "Rejected recognition request");
            self.emit(RecognitionEvent::Failed { error, request_id });
            return false;
        }

        let evicted = queue.push(RecognitionRequest::new(image, request_id, config));
        drop(queue);
        if let Some(old) = evicted {
            trace!(
                evicted = old.request_id,
                request_id,
                "Queue full, dropped oldest request"
            );
        }

        self.wake.notify_one();
        true
    }

    /// Process at most one pending request
    ///
    /// A no-op (returning `None`) when the queue is empty, a request is
    /// already in flight, or the pipeline is shut down. Otherwise decodes
    /// synchronously and returns the id that was processed.
    pub fn tick(&self) -> Option<RequestId> {
        if self.is_shut_down() {
            return None;
        }

        let request = self.lock_queue().begin()?;
        let _in_flight = InFlight { queue: &self.queue };
        let request_id = request.request_id;

        trace!(
            request_id,
            waited_ms = request.enqueued_at.elapsed().as_millis(),
            "Processing recognition request"
        );

        let outcome = self.adapter.decode_single(&request.image, &request.config);
        let event = match outcome {
            Ok(result) => {
                if !result.is_valid {
                    let idle = self.idle_results.fetch_add(1, Ordering::Relaxed) + 1;
                    if idle % NO_SYMBOL_LOG_EVERY == 0 {
                        debug!(idle_results = idle, "No symbol found in recent frames");
                    }
                }
                RecognitionEvent::Completed { result, request_id }
            }
            Err(error) => {
                let failures = self.failures.fetch_add(1, Ordering::Relaxed) + 1;
                if failures % FAILURE_LOG_EVERY == 1 {
                    warn!(request_id, failures, error = %error, "Recognition failed");
                }
                RecognitionEvent::Failed { error, request_id }
            }
        };

        // Dropped before `_in_flight`, which locks the queue again
        let _queue = self.lock_queue();
        if self.is_shut_down() {
            debug!(request_id, "Pipeline shut down, discarding in-flight result");
            return None;
        }
        self.emit(event);
        Some(request_id)
    }

    /// Number of requests waiting (excluding one in flight)
    pub fn pending(&self) -> usize {
        self.lock_queue().len()
    }

    pub fn is_processing(&self) -> bool {
        self.lock_queue().is_processing()
    }

    pub fn pending_ids(&self) -> Vec<RequestId> {
        self.lock_queue().pending_ids()
    }

    /// Stop processing; pending and in-flight requests never produce events
    ///
    /// Once this returns no further event is emitted, even by a decode that
    /// was already running.
    pub fn shutdown(&self) {
        let dropped = {
            let mut queue = self.lock_queue();
            if self.shutdown.swap(true, Ordering::SeqCst) {
                return;
            }
            queue.clear()
        };
        info!(dropped, "Recognition pipeline shut down");
        self.wake.notify_one();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Resolves after the next enqueue or shutdown
    pub(crate) async fn wait_for_work(&self) {
        self.wake.notified().await;
    }

    fn emit(&self, event: RecognitionEvent) {
        if self.events.send(event).is_err() {
            trace!("No subscribers for recognition event");
        }
    }

    fn lock_queue(&self) -> MutexGuard<'_, RequestQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
