// SPDX-License-Identifier: GPL-3.0-only

//! Deterministic ordering of multi-format results

use super::formats::BarcodeFormat;
use super::types::RecognitionResult;
use std::cmp::Ordering;

/// Popularity of a format; higher sorts first, unranked formats score 0
pub fn popularity_score(format: BarcodeFormat) -> u8 {
    match format {
        BarcodeFormat::QrCode => 100,
        BarcodeFormat::Ean13 => 90,
        BarcodeFormat::Ean8 => 85,
        BarcodeFormat::UpcA => 80,
        BarcodeFormat::UpcE => 75,
        BarcodeFormat::Code128 => 70,
        BarcodeFormat::Code39 => 65,
        BarcodeFormat::DataMatrix => 60,
        BarcodeFormat::Pdf417 => 55,
        BarcodeFormat::Aztec => 50,
        BarcodeFormat::Itf => 45,
        BarcodeFormat::Code93 => 40,
        BarcodeFormat::Codabar => 35,
        BarcodeFormat::MicroQrCode => 30,
        BarcodeFormat::MaxiCode => 25,
        BarcodeFormat::DataBar | BarcodeFormat::DataBarExpanded | BarcodeFormat::Unknown => 0,
    }
}

/// Total order used by [`rank`]: popularity, then confidence, both descending
pub fn compare(a: &RecognitionResult, b: &RecognitionResult) -> Ordering {
    popularity_score(b.format)
        .cmp(&popularity_score(a.format))
        .then_with(|| b.confidence.total_cmp(&a.confidence))
}

/// Sort results in place; equal elements keep their relative order
pub fn rank(results: &mut [RecognitionResult]) {
    // slice::sort_by is stable
    results.sort_by(compare);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognition::types::Quadrilateral;

    fn result(text: &str, format: BarcodeFormat, confidence: f32) -> RecognitionResult {
        RecognitionResult {
            confidence,
            ..RecognitionResult::new(text, format, Quadrilateral::default())
        }
    }

    #[test]
    fn test_popularity_beats_confidence() {
        let mut results = vec![
            result("a", BarcodeFormat::Code93, 0.9),
            result("b", BarcodeFormat::QrCode, 0.5),
        ];
        rank(&mut results);
        assert_eq!(results[0].format, BarcodeFormat::QrCode);
        assert_eq!(results[1].text, "a");
    }

    #[test]
    fn test_confidence_breaks_format_ties() {
        let mut results = vec![
            result("low", BarcodeFormat::Ean13, 0.2),
            result("high", BarcodeFormat::Ean13, 0.8),
        ];
        rank(&mut results);
        assert_eq!(results[0].text, "high");
    }

    #[test]
    fn test_full_ties_keep_input_order() {
        let mut results = vec![
            result("first", BarcodeFormat::Code128, 1.0),
            result("other", BarcodeFormat::DataBar, 1.0),
            result("second", BarcodeFormat::Code128, 1.0),
            result("third", BarcodeFormat::Code128, 1.0),
        ];
        rank(&mut results);
        let texts: Vec<_> = results.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, ["first", "second", "third", "other"]);
    }

    #[test]
    fn test_catalogue_is_in_popularity_order() {
        let scores: Vec<u8> = BarcodeFormat::ALL
            .iter()
            .map(|f| popularity_score(*f))
            .collect();
        assert!(scores.windows(2).all(|pair| pair[0] > pair[1]));
        assert_eq!(scores.first(), Some(&100));
        assert_eq!(scores.last(), Some(&25));
    }

    #[test]
    fn test_unlisted_formats_score_zero() {
        assert_eq!(popularity_score(BarcodeFormat::Unknown), 0);
        assert_eq!(popularity_score(BarcodeFormat::DataBarExpanded), 0);
    }
}
