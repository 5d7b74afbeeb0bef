// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the queue, scheduler and orchestrator

use image::{DynamicImage, RgbaImage};
use qrscan::RecognitionError;
use qrscan::recognition::{
    BarcodeFormat, BarcodeReader, CaptureOrchestrator, CaptureOutcome, DecodeOptions,
    DecoderAdapter, PipelineSettings, Quadrilateral, RawBarcode, RecognitionConfig,
    RecognitionEvent, RecognitionPipeline, RqrrReader, Scheduler,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;

/// Reports `frame-<width>`; a width of 1 means nothing in view
#[derive(Default)]
struct EchoReader {
    delay: Duration,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl EchoReader {
    fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }
}

impl BarcodeReader for EchoReader {
    fn read_barcodes(
        &self,
        image: &RgbaImage,
        _options: &DecodeOptions,
    ) -> Result<Vec<RawBarcode>, RecognitionError> {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        if image.width() == 1 {
            return Ok(Vec::new());
        }
        Ok(vec![RawBarcode {
            text: format!("frame-{}", image.width()),
            format: BarcodeFormat::QrCode,
            position: Quadrilateral::default(),
            is_valid: true,
        }])
    }
}

fn frame(width: u32) -> DynamicImage {
    DynamicImage::new_rgba8(width, 2)
}

fn pipeline_with(reader: Arc<EchoReader>, tick: Duration) -> Arc<RecognitionPipeline> {
    Arc::new(RecognitionPipeline::new(
        DecoderAdapter::new(reader),
        PipelineSettings {
            tick_interval: tick,
            ..PipelineSettings::default()
        },
    ))
}

async fn next_event(
    events: &mut broadcast::Receiver<RecognitionEvent>,
    within: Duration,
) -> Option<RecognitionEvent> {
    tokio::time::timeout(within, events.recv()).await.ok()?.ok()
}

#[test]
fn test_evicted_requests_never_produce_events() {
    let pipeline = pipeline_with(Arc::new(EchoReader::default()), Duration::from_millis(10));
    let mut events = pipeline.subscribe();

    for id in 1..=10 {
        assert!(pipeline.enqueue(id, frame(10 + id as u32), RecognitionConfig::continuous()));
    }
    assert_eq!(pipeline.pending_ids(), vec![8, 9, 10]);

    while pipeline.tick().is_some() {}

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event.request_id());
    }
    assert_eq!(seen, vec![8, 9, 10]);
}

#[test]
fn test_single_flight_under_concurrent_ticks() {
    let reader = Arc::new(EchoReader::slow(Duration::from_millis(5)));
    let pipeline = pipeline_with(Arc::clone(&reader), Duration::from_millis(10));
    let mut events = pipeline.subscribe();

    for id in 1..=3 {
        pipeline.enqueue(id, frame(20), RecognitionConfig::continuous());
    }

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let pipeline = Arc::clone(&pipeline);
            std::thread::spawn(move || {
                for _ in 0..50 {
                    pipeline.tick();
                    std::thread::sleep(Duration::from_millis(1));
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(reader.max_active.load(Ordering::SeqCst), 1);
    assert_eq!(pipeline.pending(), 0);

    let mut processed = Vec::new();
    while let Ok(event) = events.try_recv() {
        processed.push(event.request_id());
    }
    assert_eq!(processed, vec![1, 2, 3]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_scheduler_drains_and_resumes() {
    let pipeline = pipeline_with(Arc::new(EchoReader::default()), Duration::from_millis(10));
    let mut events = pipeline.subscribe();
    let scheduler = Scheduler::spawn(Arc::clone(&pipeline));

    pipeline.enqueue(1, frame(11), RecognitionConfig::continuous());
    pipeline.enqueue(2, frame(12), RecognitionConfig::continuous());

    let first = next_event(&mut events, Duration::from_secs(2)).await.unwrap();
    let second = next_event(&mut events, Duration::from_secs(2)).await.unwrap();
    assert_eq!((first.request_id(), second.request_id()), (1, 2));
    assert_eq!(pipeline.pending(), 0);

    // Idle for a while, then wake it up again
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(scheduler.is_running());
    pipeline.enqueue(3, frame(13), RecognitionConfig::continuous());

    match next_event(&mut events, Duration::from_secs(2)).await {
        Some(RecognitionEvent::Completed { result, request_id }) => {
            assert_eq!(request_id, 3);
            assert_eq!(result.text, "frame-13");
        }
        other => panic!("Expected Completed for request 3, got {:?}", other),
    }

    scheduler.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shutdown_discards_in_flight_request() {
    let reader = Arc::new(EchoReader::slow(Duration::from_millis(200)));
    let pipeline = pipeline_with(reader, Duration::from_millis(10));
    let mut events = pipeline.subscribe();
    let scheduler = Scheduler::spawn(Arc::clone(&pipeline));

    pipeline.enqueue(1, frame(10), RecognitionConfig::continuous());
    pipeline.enqueue(2, frame(10), RecognitionConfig::continuous());

    let started = tokio::time::timeout(Duration::from_secs(2), async {
        while !pipeline.is_processing() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await;
    assert!(started.is_ok(), "Request never started processing");

    scheduler.shutdown().await;
    assert!(pipeline.is_shut_down());
    assert_eq!(pipeline.pending(), 0);

    // Outlast the in-flight decode
    assert!(next_event(&mut events, Duration::from_millis(400)).await.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_queued_recognition_returns_own_event() {
    let pipeline = pipeline_with(Arc::new(EchoReader::default()), Duration::from_millis(10));
    let scheduler = Scheduler::spawn(Arc::clone(&pipeline));
    let orchestrator = CaptureOrchestrator::new(Arc::clone(&pipeline));

    // Another consumer's request is in the queue too
    orchestrator.capture_continuous(frame(30));

    let event = orchestrator
        .recognize_queued(frame(31), RecognitionConfig::thorough(), Duration::from_secs(2))
        .await
        .unwrap();
    assert_eq!(event.request_id(), 2);
    match event {
        RecognitionEvent::Completed { result, .. } => assert_eq!(result.text, "frame-31"),
        other => panic!("Expected Completed, got {:?}", other),
    }

    let rejected = orchestrator
        .recognize_queued(
            DynamicImage::new_rgba8(0, 0),
            RecognitionConfig::thorough(),
            Duration::from_secs(2),
        )
        .await
        .unwrap();
    assert!(matches!(
        rejected.error(),
        Some(RecognitionError::InvalidImage(_))
    ));

    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_real_reader_finds_nothing_in_blank_frame() {
    let pipeline = Arc::new(RecognitionPipeline::new(
        DecoderAdapter::new(Arc::new(RqrrReader::new())),
        PipelineSettings::default(),
    ));
    let orchestrator = CaptureOrchestrator::new(pipeline);

    let blank = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
        64,
        64,
        image::Rgba([255, 255, 255, 255]),
    ));
    let capture = orchestrator.capture_manual(blank).await;
    assert_eq!(capture.outcome, CaptureOutcome::NoCodeFound);
}
