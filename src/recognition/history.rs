// SPDX-License-Identifier: GPL-3.0-only

//! Detection history
//!
//! Keeps the valid detections of a session in arrival order and can write
//! them out as a plain-text report. Back-to-back repeats of one code fold
//! into a single entry, and only the newest [`MAX_HISTORY_ENTRIES`] entries
//! are kept.

use super::formats::BarcodeFormat;
use super::gate::Classification;
use super::types::RecognitionResult;
use crate::constants::MAX_HISTORY_ENTRIES;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::Path;
use tracing::{debug, info, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryMarker {
    New,
    Repeat,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub recorded_at: DateTime<Local>,
    pub text: String,
    pub format: BarcodeFormat,
    pub confidence: f32,
    pub marker: HistoryMarker,
    /// Consecutive sightings folded into this entry
    pub sightings: u32,
}

#[derive(Debug)]
pub struct DetectionHistory {
    entries: Vec<HistoryEntry>,
    /// Text and format pairs recorded as new, including dropped entries
    seen: HashSet<(String, BarcodeFormat)>,
    capacity: usize,
}

impl Default for DetectionHistory {
    fn default() -> Self {
        Self::with_capacity(MAX_HISTORY_ENTRIES)
    }
}

impl DetectionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `capacity` entries (at least one)
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            seen: HashSet::new(),
            capacity: capacity.max(1),
        }
    }

    /// Record a valid detection and return its marker
    ///
    /// The detection is a repeat when the gate classified it as a duplicate
    /// or when the same text and format were already recorded as new. A
    /// repeat of the latest entry only bumps its `sightings`. Invalid
    /// results are not recorded.
    pub fn record(
        &mut self,
        result: &RecognitionResult,
        classification: Classification,
    ) -> Option<HistoryMarker> {
        self.record_at(result, classification, Local::now())
    }

    pub fn record_at(
        &mut self,
        result: &RecognitionResult,
        classification: Classification,
        recorded_at: DateTime<Local>,
    ) -> Option<HistoryMarker> {
        if !result.is_valid {
            return None;
        }

        let key = (result.text.clone(), result.format);
        let repeat = classification == Classification::Duplicate || self.seen.contains(&key);
        let marker = if repeat {
            HistoryMarker::Repeat
        } else {
            HistoryMarker::New
        };

        if marker == HistoryMarker::Repeat
            && let Some(last) = self.entries.last_mut()
            && last.text == result.text
            && last.format == result.format
        {
            last.sightings = last.sightings.saturating_add(1);
            return Some(marker);
        }

        if marker == HistoryMarker::New {
            self.seen.insert(key);
        }
        if self.entries.len() == self.capacity {
            self.entries.remove(0);
            trace!(capacity = self.capacity, "History full, dropped oldest entry");
        }
        self.entries.push(HistoryEntry {
            recorded_at,
            text: result.text.clone(),
            format: result.format,
            confidence: result.confidence,
            marker,
            sightings: 1,
        });
        Some(marker)
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Entries recorded as new, oldest first
    pub fn unique(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.marker == HistoryMarker::New)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        debug!(entries = self.entries.len(), "Detection history cleared");
        self.entries.clear();
        self.seen.clear();
    }

    /// Render the plain-text report written by [`Self::export_text`]
    pub fn render_report(&self, generated_at: DateTime<Local>) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Barcode Detection History");
        let _ = writeln!(
            out,
            "Generated: {}",
            generated_at.format("%Y-%m-%d %H:%M:%S")
        );
        let _ = writeln!(out, "Total detections: {}", self.entries.len());
        out.push('\n');

        for (i, entry) in self.entries.iter().enumerate() {
            let _ = writeln!(out, "=== Detection {} ===", i + 1);
            let _ = writeln!(out, "Content: {}", entry.text);
            let _ = writeln!(out, "Format: {}", entry.format);
            let _ = writeln!(out, "Confidence: {:.2}", entry.confidence);
            out.push('\n');
        }
        out
    }

    /// Write the report to `path` as UTF-8
    pub fn export_text(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, self.render_report(Local::now()))?;
        info!(path = %path.display(), entries = self.entries.len(), "Exported detection history");
        Ok(())
    }
}

/// `camera_detection_YYYYmmdd_HHMMSS.txt` for the given time
pub fn default_export_name(at: DateTime<Local>) -> String {
    format!("camera_detection_{}.txt", at.format("%Y%m%d_%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognition::types::Quadrilateral;
    use chrono::TimeZone;

    fn detection(text: &str, format: BarcodeFormat) -> RecognitionResult {
        RecognitionResult::new(text, format, Quadrilateral::default())
    }

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap()
    }

    #[test]
    fn test_markers() {
        let mut history = DetectionHistory::new();
        let qr = detection("A", BarcodeFormat::QrCode);

        assert_eq!(
            history.record(&qr, Classification::New),
            Some(HistoryMarker::New)
        );
        assert_eq!(
            history.record(&qr, Classification::Duplicate),
            Some(HistoryMarker::Repeat)
        );
        // Cooldown lapsed but the pair is already in the history
        assert_eq!(
            history.record(&qr, Classification::New),
            Some(HistoryMarker::Repeat)
        );
        // Same text in another symbology is a different pair
        assert_eq!(
            history.record(&detection("A", BarcodeFormat::Code128), Classification::New),
            Some(HistoryMarker::New)
        );

        // The repeats folded into the first entry
        assert_eq!(history.len(), 2);
        assert_eq!(history.entries()[0].sightings, 3);
        assert_eq!(history.unique().count(), 2);
    }

    #[test]
    fn test_steady_code_keeps_one_entry() {
        let mut history = DetectionHistory::new();
        let qr = detection("X", BarcodeFormat::QrCode);

        history.record(&qr, Classification::New);
        for _ in 0..10_000 {
            history.record(&qr, Classification::Duplicate);
        }

        assert_eq!(history.len(), 1);
        assert_eq!(history.entries()[0].marker, HistoryMarker::New);
        assert_eq!(history.entries()[0].sightings, 10_001);
    }

    #[test]
    fn test_interleaved_repeats_are_separate_entries() {
        let mut history = DetectionHistory::new();
        let a = detection("A", BarcodeFormat::QrCode);
        let b = detection("B", BarcodeFormat::QrCode);

        history.record(&a, Classification::New);
        history.record(&b, Classification::New);
        assert_eq!(
            history.record(&a, Classification::New),
            Some(HistoryMarker::Repeat)
        );

        let markers: Vec<_> = history.entries().iter().map(|e| e.marker).collect();
        assert_eq!(
            markers,
            vec![HistoryMarker::New, HistoryMarker::New, HistoryMarker::Repeat]
        );
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let mut history = DetectionHistory::with_capacity(3);
        for i in 0..5 {
            let code = detection(&format!("code-{}", i), BarcodeFormat::QrCode);
            history.record(&code, Classification::New);
        }

        let texts: Vec<_> = history.entries().iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["code-2", "code-3", "code-4"]);

        // Dropped entries still count as seen
        assert_eq!(
            history.record(&detection("code-0", BarcodeFormat::QrCode), Classification::New),
            Some(HistoryMarker::Repeat)
        );
    }

    #[test]
    fn test_invalid_not_recorded() {
        let mut history = DetectionHistory::new();
        assert_eq!(
            history.record(&RecognitionResult::invalid(), Classification::New),
            None
        );
        assert!(history.is_empty());
    }

    #[test]
    fn test_report_layout() {
        let mut history = DetectionHistory::new();
        history.record_at(
            &detection("hello", BarcodeFormat::QrCode),
            Classification::New,
            fixed_time(),
        );

        let report = history.render_report(fixed_time());
        assert!(report.starts_with("Barcode Detection History\nGenerated: 2024-03-09 14:05:07\n"));
        assert!(report.contains("Total detections: 1\n\n"));
        assert!(report.contains(
            "=== Detection 1 ===\nContent: hello\nFormat: QRCode\nConfidence: 1.00\n"
        ));
    }

    #[test]
    fn test_export_and_clear() {
        let mut history = DetectionHistory::new();
        history.record(&detection("X", BarcodeFormat::Ean13), Classification::New);

        let path = std::env::temp_dir().join(format!(
            "qrscan-history-{}.txt",
            std::process::id()
        ));
        history.export_text(&path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert!(written.contains("Content: X"));
        assert!(written.contains("Format: EAN-13"));

        history.clear();
        assert!(history.is_empty());
    }

    #[test]
    fn test_default_export_name() {
        assert_eq!(
            default_export_name(fixed_time()),
            "camera_detection_20240309_140507.txt"
        );
    }
}
