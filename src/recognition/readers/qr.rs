// SPDX-License-Identifier: GPL-3.0-only

//! QR code reader backed by the rqrr crate
//!
//! rqrr only understands QR codes, so every other requested format is
//! silently unsupported. Grid detection is orientation independent, which
//! makes `try_rotate` a no-op for this backend. `try_harder` adds a second
//! pass over the inverted image to catch light-on-dark codes.

use crate::errors::RecognitionError;
use crate::recognition::decoder::{BarcodeReader, DecodeOptions, RawBarcode};
use crate::recognition::formats::BarcodeFormat;
use crate::recognition::types::{Point, Quadrilateral};
use image::{GrayImage, RgbaImage};
use rqrr::PreparedImage;
use tracing::{debug, trace};

/// QR code reader
#[derive(Debug, Default, Clone, Copy)]
pub struct RqrrReader;

impl RqrrReader {
    pub fn new() -> Self {
        Self
    }
}

impl BarcodeReader for RqrrReader {
    fn read_barcodes(
        &self,
        image: &RgbaImage,
        options: &DecodeOptions,
    ) -> Result<Vec<RawBarcode>, RecognitionError> {
        if !options.wants(BarcodeFormat::QrCode) {
            return Ok(Vec::new());
        }

        let mut luma = image::imageops::grayscale(image);
        let mut found = scan_grids(&luma);

        if found.is_empty() && options.try_harder {
            trace!("No QR grid found, retrying on inverted image");
            image::imageops::invert(&mut luma);
            found = scan_grids(&luma);
        }

        found.truncate(options.max_symbols.max(1));
        Ok(found)
    }
}

/// Detect and decode every QR grid in a grayscale image
fn scan_grids(luma: &GrayImage) -> Vec<RawBarcode> {
    let (width, height) = luma.dimensions();
    let mut prepared = PreparedImage::prepare_from_greyscale(
        width as usize,
        height as usize,
        |x, y| luma.get_pixel(x as u32, y as u32).0[0],
    );

    let grids = prepared.detect_grids();
    trace!(count = grids.len(), "QR grid detection complete");

    let mut barcodes = Vec::with_capacity(grids.len());
    for grid in grids {
        let content = match grid.decode() {
            Ok((_meta, content)) => content,
            Err(e) => {
                debug!(error = %e, "Failed to decode QR grid");
                continue;
            }
        };

        let [tl, tr, br, bl] = grid.bounds;
        barcodes.push(RawBarcode {
            text: content,
            format: BarcodeFormat::QrCode,
            position: Quadrilateral::new(
                Point::new(tl.x, tl.y),
                Point::new(tr.x, tr.y),
                Point::new(br.x, br.y),
                Point::new(bl.x, bl.y),
            ),
            is_valid: true,
        });
    }

    barcodes
}
