// SPDX-License-Identifier: GPL-3.0-only

//! Bounded recognition request queue
//!
//! A FIFO with a hard capacity. Pushing into a full queue evicts the oldest
//! request: under sustained backpressure stale frames are dropped instead of
//! letting latency grow. The queue also tracks whether a request is in
//! flight so the scheduler can enforce single-flight processing.

use super::types::{RecognitionConfig, RequestId};
use image::DynamicImage;
use std::collections::VecDeque;
use tokio::time::Instant;

/// A pending recognition, owned by the queue until dequeued
#[derive(Debug, Clone)]
pub struct RecognitionRequest {
    pub image: DynamicImage,
    pub request_id: RequestId,
    pub config: RecognitionConfig,
    pub enqueued_at: Instant,
}

impl RecognitionRequest {
    pub fn new(image: DynamicImage, request_id: RequestId, config: RecognitionConfig) -> Self {
        Self {
            image,
            request_id,
            config,
            enqueued_at: Instant::now(),
        }
    }
}

#[derive(Debug)]
pub struct RequestQueue {
    capacity: usize,
    pending: VecDeque<RecognitionRequest>,
    processing: bool,
}

impl RequestQueue {
    /// Create a queue holding at most `capacity` requests (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            pending: VecDeque::with_capacity(capacity),
            processing: false,
        }
    }

    /// Append a request, returning the evicted one if the queue was full
    pub fn push(&mut self, request: RecognitionRequest) -> Option<RecognitionRequest> {
        let evicted = if self.pending.len() >= self.capacity {
            self.pending.pop_front()
        } else {
            None
        };
        self.pending.push_back(request);
        evicted
    }

    /// Take the oldest request and mark it in flight
    ///
    /// Returns `None` while another request is in flight or when empty.
    pub fn begin(&mut self) -> Option<RecognitionRequest> {
        if self.processing {
            return None;
        }
        let request = self.pending.pop_front()?;
        self.processing = true;
        Some(request)
    }

    /// Mark the in-flight request as done
    pub fn finish(&mut self) {
        self.processing = false;
    }

    /// Drop every pending request, returning how many were discarded
    pub fn clear(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn is_processing(&self) -> bool {
        self.processing
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Ids of pending requests, oldest first
    pub fn pending_ids(&self) -> Vec<RequestId> {
        self.pending.iter().map(|r| r.request_id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(id: RequestId) -> RecognitionRequest {
        RecognitionRequest::new(
            DynamicImage::new_luma8(4, 4),
            id,
            RecognitionConfig::continuous(),
        )
    }

    #[test]
    fn test_bound_keeps_most_recent() {
        let mut queue = RequestQueue::new(3);
        let mut evicted = Vec::new();
        for id in 1..=10 {
            if let Some(old) = queue.push(request(id)) {
                evicted.push(old.request_id);
            }
            assert!(queue.len() <= 3);
        }
        assert_eq!(queue.pending_ids(), vec![8, 9, 10]);
        assert_eq!(evicted, (1..=7).collect::<Vec<_>>());
    }

    #[test]
    fn test_begin_is_single_flight() {
        let mut queue = RequestQueue::new(3);
        queue.push(request(1));
        queue.push(request(2));

        let first = queue.begin().unwrap();
        assert_eq!(first.request_id, 1);
        assert!(queue.is_processing());
        assert!(queue.begin().is_none());

        queue.finish();
        assert_eq!(queue.begin().unwrap().request_id, 2);
    }

    #[test]
    fn test_begin_on_empty_does_not_mark_processing() {
        let mut queue = RequestQueue::new(3);
        assert!(queue.begin().is_none());
        assert!(!queue.is_processing());
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let mut queue = RequestQueue::new(0);
        assert_eq!(queue.capacity(), 1);
        queue.push(request(1));
        let evicted = queue.push(request(2)).unwrap();
        assert_eq!(evicted.request_id, 1);
        assert_eq!(queue.pending_ids(), vec![2]);
        assert_eq!(queue.clear(), 1);
        assert!(queue.is_empty());
    }
}
