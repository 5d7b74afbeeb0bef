// SPDX-License-Identifier: GPL-3.0-only

//! Decoder adapter
//!
//! Wraps an external barcode reader behind [`BarcodeReader`]. The adapter
//! normalizes and downscales images, translates [`RecognitionConfig`] into
//! reader options, converts reader failures (including panics) into
//! [`RecognitionError::Decode`] and ranks whatever comes back.

use super::formats::BarcodeFormat;
use super::ranking;
use super::types::{Quadrilateral, RecognitionConfig, RecognitionResult};
use crate::constants::MAX_DECODE_DIMENSION;
use crate::errors::RecognitionError;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, RgbaImage};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace, warn};

/// Options handed to the external reader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Formats the reader should look for
    pub formats: Vec<BarcodeFormat>,
    pub try_harder: bool,
    pub try_rotate: bool,
    pub max_symbols: usize,
}

impl DecodeOptions {
    /// Request every supported format with the config's effective flags
    pub fn from_config(config: &RecognitionConfig) -> Self {
        Self {
            formats: BarcodeFormat::ALL.to_vec(),
            try_harder: config.effective_try_harder(),
            try_rotate: config.effective_try_rotate(),
            max_symbols: config.effective_max_symbols(),
        }
    }

    /// Whether the reader was asked for this format
    pub fn wants(&self, format: BarcodeFormat) -> bool {
        self.formats.contains(&format)
    }
}

/// A match as reported by the external reader
#[derive(Debug, Clone, PartialEq)]
pub struct RawBarcode {
    pub text: String,
    pub format: BarcodeFormat,
    pub position: Quadrilateral,
    pub is_valid: bool,
}

/// The external decoding library
///
/// Implementations receive an RGBA image no larger than the adapter's
/// maximum dimension and return every symbol they found, in any order.
/// Finding nothing is `Ok(vec![])`, never an error.
pub trait BarcodeReader: Send + Sync {
    fn read_barcodes(
        &self,
        image: &RgbaImage,
        options: &DecodeOptions,
    ) -> Result<Vec<RawBarcode>, RecognitionError>;
}

/// Reject null or empty pixel buffers
pub fn validate_image(image: &DynamicImage) -> Result<(), RecognitionError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(RecognitionError::InvalidImage(format!(
            "image has no pixels ({}x{})",
            width, height
        )));
    }
    if image.as_bytes().is_empty() {
        return Err(RecognitionError::InvalidImage("pixel buffer is empty".into()));
    }
    Ok(())
}

/// Convert to RGBA8 and downscale so neither side exceeds `max_dimension`
///
/// Returns the prepared image and the factor mapping its coordinates back to
/// the source image (1.0 when no downscaling happened).
pub fn preprocess(image: &DynamicImage, max_dimension: u32) -> (RgbaImage, f64) {
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();

    if width <= max_dimension && height <= max_dimension {
        return (rgba, 1.0);
    }

    let scale = (width as f64 / max_dimension as f64).max(height as f64 / max_dimension as f64);
    let new_width = ((width as f64 / scale).round() as u32).clamp(1, max_dimension);
    let new_height = ((height as f64 / scale).round() as u32).clamp(1, max_dimension);

    trace!(
        width,
        height,
        new_width,
        new_height,
        scale,
        "Downscaling image before decoding"
    );

    let resized = image::imageops::resize(&rgba, new_width, new_height, FilterType::Triangle);
    (resized, scale)
}

/// Bridges pipeline requests to a [`BarcodeReader`]
#[derive(Clone)]
pub struct DecoderAdapter {
    reader: Arc<dyn BarcodeReader>,
    max_dimension: u32,
}

impl std::fmt::Debug for DecoderAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderAdapter")
            .field("max_dimension", &self.max_dimension)
            .finish_non_exhaustive()
    }
}

impl DecoderAdapter {
    pub fn new(reader: Arc<dyn BarcodeReader>) -> Self {
        Self {
            reader,
            max_dimension: MAX_DECODE_DIMENSION,
        }
    }

    /// Use a custom downscale bound
    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = max_dimension.max(1);
        self
    }

    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }

    /// Find every symbol in the image, most popular format first
    ///
    /// An empty list means nothing was found. Errors are reserved for
    /// malformed images and decoder failures.
    pub fn decode_multi(
        &self,
        image: &DynamicImage,
        config: &RecognitionConfig,
    ) -> Result<Vec<RecognitionResult>, RecognitionError> {
        validate_image(image)?;
        let start = Instant::now();

        let (prepared, scale) = preprocess(image, self.max_dimension);
        let options = DecodeOptions::from_config(config);

        let raw = catch_unwind(AssertUnwindSafe(|| {
            self.reader.read_barcodes(&prepared, &options)
        }))
        .map_err(|payload| {
            let message = panic_message(payload.as_ref());
            warn!(error = %message, "Barcode reader panicked");
            RecognitionError::Decode(message)
        })??;

        let mut results: Vec<RecognitionResult> = raw
            .into_iter()
            .filter(|barcode| barcode.is_valid)
            .map(|barcode| {
                RecognitionResult::new(barcode.text, barcode.format, barcode.position.scaled(scale))
            })
            .collect();

        ranking::rank(&mut results);
        results.truncate(options.max_symbols);

        if !results.is_empty() {
            debug!(
                count = results.len(),
                top_format = %results[0].format,
                elapsed_ms = start.elapsed().as_millis(),
                "Decoded barcodes"
            );
        }

        Ok(results)
    }

    /// Top-ranked match, or an invalid result when nothing was found
    pub fn decode_single(
        &self,
        image: &DynamicImage,
        config: &RecognitionConfig,
    ) -> Result<RecognitionResult, RecognitionError> {
        Ok(self
            .decode_multi(image, config)?
            .into_iter()
            .next()
            .unwrap_or_else(RecognitionResult::invalid))
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "barcode reader panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognition::types::Point;
    use std::sync::Mutex;

    /// Reader returning a fixed list and recording the options it saw
    struct ScriptedReader {
        barcodes: Vec<RawBarcode>,
        seen: Mutex<Vec<(u32, u32, DecodeOptions)>>,
    }

    impl ScriptedReader {
        fn new(barcodes: Vec<RawBarcode>) -> Arc<Self> {
            Arc::new(Self {
                barcodes,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    impl BarcodeReader for ScriptedReader {
        fn read_barcodes(
            &self,
            image: &RgbaImage,
            options: &DecodeOptions,
        ) -> Result<Vec<RawBarcode>, RecognitionError> {
            self.seen
                .lock()
                .unwrap()
                .push((image.width(), image.height(), options.clone()));
            Ok(self.barcodes.clone())
        }
    }

    struct PanickingReader;

    impl BarcodeReader for PanickingReader {
        fn read_barcodes(
            &self,
            _image: &RgbaImage,
            _options: &DecodeOptions,
        ) -> Result<Vec<RawBarcode>, RecognitionError> {
            panic!("corrupt symbol table");
        }
    }

    fn raw(text: &str, format: BarcodeFormat) -> RawBarcode {
        RawBarcode {
            text: text.to_string(),
            format,
            position: Quadrilateral::new(
                Point::new(1, 1),
                Point::new(9, 1),
                Point::new(9, 9),
                Point::new(1, 9),
            ),
            is_valid: true,
        }
    }

    #[test]
    fn test_preprocess_keeps_small_images() {
        let image = DynamicImage::new_rgb8(640, 480);
        let (prepared, scale) = preprocess(&image, 1920);
        assert_eq!(prepared.dimensions(), (640, 480));
        assert_eq!(scale, 1.0);
    }

    #[test]
    fn test_preprocess_downscales_preserving_aspect() {
        let image = DynamicImage::new_rgba8(3840, 2160);
        let (prepared, scale) = preprocess(&image, 1920);
        assert_eq!(prepared.dimensions(), (1920, 1080));
        assert!((scale - 2.0).abs() < f64::EPSILON);

        let tall = DynamicImage::new_luma8(1000, 4000);
        let (prepared, _) = preprocess(&tall, 1920);
        assert_eq!(prepared.dimensions(), (480, 1920));
    }

    #[test]
    fn test_validate_rejects_empty_image() {
        let image = DynamicImage::new_rgba8(0, 10);
        assert!(matches!(
            validate_image(&image),
            Err(RecognitionError::InvalidImage(_))
        ));
    }

    #[test]
    fn test_options_from_fast_config() {
        let config = RecognitionConfig {
            try_harder: true,
            try_rotate: true,
            fast_mode: true,
            max_symbols: 3,
        };
        let options = DecodeOptions::from_config(&config);
        assert!(!options.try_harder);
        assert!(!options.try_rotate);
        assert_eq!(options.max_symbols, 3);
        assert_eq!(options.formats.len(), BarcodeFormat::ALL.len());
        assert!(options.wants(BarcodeFormat::MaxiCode));
    }

    #[test]
    fn test_decode_multi_ranks_and_filters_invalid() {
        let mut broken = raw("broken", BarcodeFormat::QrCode);
        broken.is_valid = false;
        let reader = ScriptedReader::new(vec![
            raw("4006381333931", BarcodeFormat::Ean13),
            broken,
            raw("https://example.com", BarcodeFormat::QrCode),
        ]);
        let adapter = DecoderAdapter::new(reader.clone());

        let image = DynamicImage::new_rgba8(100, 100);
        let config = RecognitionConfig::default().with_max_symbols(5);
        let results = adapter.decode_multi(&image, &config).unwrap();

        let texts: Vec<_> = results.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, ["https://example.com", "4006381333931"]);
        assert!(results.iter().all(|r| r.is_valid && r.confidence == 1.0));
    }

    #[test]
    fn test_decode_multi_respects_max_symbols() {
        let reader = ScriptedReader::new(vec![
            raw("a", BarcodeFormat::Code39),
            raw("b", BarcodeFormat::Code128),
        ]);
        let adapter = DecoderAdapter::new(reader);
        let image = DynamicImage::new_rgba8(10, 10);

        let results = adapter
            .decode_multi(&image, &RecognitionConfig::default())
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].text, "b");
    }

    #[test]
    fn test_positions_mapped_to_source_coordinates() {
        let reader = ScriptedReader::new(vec![raw("x", BarcodeFormat::QrCode)]);
        let adapter = DecoderAdapter::new(reader.clone()).with_max_dimension(100);

        let image = DynamicImage::new_rgba8(400, 200);
        let result = adapter
            .decode_single(&image, &RecognitionConfig::default())
            .unwrap();

        let seen = reader.seen.lock().unwrap();
        assert_eq!((seen[0].0, seen[0].1), (100, 50));
        assert_eq!(result.position.top_left(), Point::new(4, 4));
        assert_eq!(result.position.bottom_right(), Point::new(36, 36));
    }

    #[test]
    fn test_decode_single_empty_is_invalid_not_error() {
        let adapter = DecoderAdapter::new(ScriptedReader::new(Vec::new()));
        let image = DynamicImage::new_rgba8(10, 10);
        let result = adapter
            .decode_single(&image, &RecognitionConfig::continuous())
            .unwrap();
        assert!(!result.is_valid);
    }

    #[test]
    fn test_reader_panic_becomes_decode_error() {
        let adapter = DecoderAdapter::new(Arc::new(PanickingReader));
        let image = DynamicImage::new_rgba8(10, 10);
        let err = adapter
            .decode_multi(&image, &RecognitionConfig::default())
            .unwrap_err();
        assert_eq!(err, RecognitionError::Decode("corrupt symbol table".into()));
    }
}
