// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for barcode recognition
//!
//! This module provides command-line functionality for:
//! - Scanning image files (manual captures, optionally through the queue)
//! - Streaming files as continuous frames through a scan session
//! - Listing supported formats and showing the configuration

use qrscan::{AppError, AppResult, Config};
use qrscan::constants::clamp_recognition_interval;
use qrscan::recognition::{
    BarcodeFormat, CaptureOrchestrator, CaptureOutcome, Classification, ContentKind,
    DecoderAdapter, DesktopActions, Quadrilateral, RecognitionConfig, RecognitionEvent,
    RecognitionPipeline, RecognitionResult, RqrrReader, ScanSession, Scheduler, SessionUpdate,
    load_image,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};

type CliResult = AppResult<()>;

/// How long a queued scan waits for its event
const QUEUED_WAIT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct CodeReport {
    text: String,
    format: BarcodeFormat,
    content: ContentKind,
    position: Quadrilateral,
    confidence: f32,
}

impl From<&RecognitionResult> for CodeReport {
    fn from(result: &RecognitionResult) -> Self {
        Self {
            text: result.text.clone(),
            format: result.format,
            content: ContentKind::classify(&result.text),
            position: result.position,
            confidence: result.confidence,
        }
    }
}

#[derive(Debug, Serialize)]
struct FileReport {
    path: PathBuf,
    codes: Vec<CodeReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl FileReport {
    fn from_outcome(path: PathBuf, outcome: &CaptureOutcome) -> Self {
        Self {
            path,
            codes: outcome.result().map(CodeReport::from).into_iter().collect(),
            message: outcome.message(),
        }
    }
}

fn build_pipeline(config: &Config) -> Arc<RecognitionPipeline> {
    let adapter = DecoderAdapter::new(Arc::new(RqrrReader::new()));
    Arc::new(RecognitionPipeline::new(adapter, config.pipeline_settings()))
}

/// Recognize codes in image files
pub fn scan(
    config_path: Option<&Path>,
    files: Vec<PathBuf>,
    all: bool,
    json: bool,
    queued: bool,
) -> CliResult {
    let config = Config::load_or_default(config_path)?;
    let runtime = tokio::runtime::Runtime::new()?;

    let reports = runtime.block_on(async {
        let pipeline = build_pipeline(&config);
        let orchestrator = CaptureOrchestrator::new(Arc::clone(&pipeline));

        if all {
            scan_all(&orchestrator, &files).await
        } else if queued {
            let scheduler = Scheduler::spawn(pipeline);
            let reports = scan_queued(&orchestrator, &files).await;
            scheduler.shutdown().await;
            reports
        } else {
            orchestrator
                .capture_batch(&files)
                .await
                .into_iter()
                .map(|item| FileReport::from_outcome(item.path, &item.outcome))
                .collect()
        }
    });

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    for report in &reports {
        if let Some(message) = &report.message {
            println!("{}: {}", report.path.display(), message);
        }
        for code in &report.codes {
            println!(
                "{}: {} [{}] {}",
                report.path.display(),
                code.format.display_name(),
                code.content.label(),
                code.text
            );
        }
    }

    let found = reports.iter().filter(|r| !r.codes.is_empty()).count();
    println!();
    println!("{} of {} files contained a code", found, reports.len());
    Ok(())
}

async fn scan_all(orchestrator: &CaptureOrchestrator, files: &[PathBuf]) -> Vec<FileReport> {
    let mut reports = Vec::with_capacity(files.len());
    for path in files {
        let outcome = match load_image(path) {
            Ok(image) => orchestrator.capture_manual_all(image).await,
            Err(e) => Err(e),
        };
        let report = match outcome {
            Ok(results) if results.is_empty() => FileReport {
                path: path.clone(),
                codes: Vec::new(),
                message: CaptureOutcome::NoCodeFound.message(),
            },
            Ok(results) => FileReport {
                path: path.clone(),
                codes: results.iter().map(CodeReport::from).collect(),
                message: None,
            },
            Err(e) => FileReport::from_outcome(path.clone(), &CaptureOutcome::Failed(e)),
        };
        reports.push(report);
    }
    reports
}

async fn scan_queued(orchestrator: &CaptureOrchestrator, files: &[PathBuf]) -> Vec<FileReport> {
    let mut reports = Vec::with_capacity(files.len());
    for path in files {
        let image = match load_image(path) {
            Ok(image) => image,
            Err(e) => {
                reports.push(FileReport::from_outcome(
                    path.clone(),
                    &CaptureOutcome::Failed(e),
                ));
                continue;
            }
        };

        let event = orchestrator
            .recognize_queued(image, RecognitionConfig::thorough(), QUEUED_WAIT)
            .await;
        let outcome = match event {
            Some(RecognitionEvent::Completed { result, .. }) if result.is_valid => {
                CaptureOutcome::Found(result)
            }
            Some(RecognitionEvent::Completed { .. }) => CaptureOutcome::NoCodeFound,
            Some(RecognitionEvent::Failed { error, .. }) => CaptureOutcome::Failed(error),
            None => CaptureOutcome::Failed(qrscan::RecognitionError::Decode(
                "request dropped before recognition".into(),
            )),
        };
        reports.push(FileReport::from_outcome(path.clone(), &outcome));
    }
    reports
}

/// Feed files as continuous frames through a full scan session
pub fn stream(
    config_path: Option<&Path>,
    files: Vec<PathBuf>,
    interval_ms: Option<u64>,
    rounds: u32,
    export: Option<PathBuf>,
) -> CliResult {
    let config = Config::load_or_default(config_path)?;
    let mut settings = config.session_settings();
    if let Some(ms) = interval_ms {
        settings.recognition_interval = clamp_recognition_interval(Duration::from_millis(ms));
    }

    let mut frames = Vec::with_capacity(files.len());
    for path in &files {
        match load_image(path) {
            Ok(image) => frames.push(image),
            Err(e) => eprintln!("Skipping {}", e),
        }
    }
    if frames.is_empty() {
        return Err("no readable frames".into());
    }

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let pipeline = build_pipeline(&config);
        let scheduler = Scheduler::spawn(Arc::clone(&pipeline));
        let orchestrator = CaptureOrchestrator::new(Arc::clone(&pipeline));

        let (updates_tx, mut updates_rx) = mpsc::channel(32);
        let session = ScanSession::new(settings, Arc::new(DesktopActions::new()));
        let session_task = tokio::spawn(session.run(pipeline.subscribe(), updates_tx));
        let printer = tokio::spawn(async move {
            while let Some(update) = updates_rx.recv().await {
                print_update(&update);
            }
        });

        let mut ticker = tokio::time::interval(settings.recognition_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        for _ in 0..rounds {
            for frame in &frames {
                ticker.tick().await;
                orchestrator.capture_continuous(frame.clone());
            }
        }

        // Let the queue drain before stopping
        while pipeline.pending() > 0 || pipeline.is_processing() {
            tokio::time::sleep(pipeline.tick_interval()).await;
        }
        scheduler.shutdown().await;

        // Dropping the last pipeline handle closes the event channel
        drop(orchestrator);
        drop(pipeline);

        let session = session_task
            .await
            .map_err(|e| AppError::from(format!("scan session failed: {}", e)))?;
        printer
            .await
            .map_err(|e| AppError::from(format!("update printer failed: {}", e)))?;

        println!();
        println!(
            "{} new detections, {} history entries",
            session.detection_count(),
            session.history().len()
        );

        if let Some(path) = export {
            session.history().export_text(&path)?;
            println!("History written to {}", path.display());
        }

        Ok::<(), AppError>(())
    })
}

fn print_update(update: &SessionUpdate) {
    match update {
        SessionUpdate::Detected {
            request_id,
            result,
            classification: Classification::New,
            ..
        } => println!(
            "#{} new {} [{}] {}",
            request_id,
            result.format.display_name(),
            ContentKind::classify(&result.text).label(),
            result.text
        ),
        SessionUpdate::Detected {
            request_id, result, ..
        } => println!("#{} repeat {}", request_id, result.text),
        SessionUpdate::OverlayShown { dismiss_at, .. } => println!(
            "   overlay shown for {} ms",
            dismiss_at.saturating_duration_since(Instant::now()).as_millis()
        ),
        SessionUpdate::OverlayHidden => println!("   overlay hidden"),
    }
}

/// List supported formats in ranking order
pub fn list_formats() -> CliResult {
    println!("Supported formats (most popular first):");
    println!();
    for (rank, format) in BarcodeFormat::ALL.iter().enumerate() {
        println!(
            "  {:>2}. {:<18} {:<22} {}",
            rank + 1,
            format.name(),
            format.display_name(),
            format.usage()
        );
    }
    Ok(())
}

/// Print the effective configuration, or just its path
pub fn show_config(config_path: Option<&Path>, path_only: bool) -> CliResult {
    let path = match config_path {
        Some(path) => path.to_path_buf(),
        None => Config::default_path()?,
    };

    if path_only {
        println!("{}", path.display());
        return Ok(());
    }

    let config = Config::load_or_default(Some(path.as_path()))?;
    println!("# {}", path.display());
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
