// SPDX-License-Identifier: GPL-3.0-only

//! Barcode symbologies and the supported-format catalogue

use serde::{Deserialize, Serialize};
use std::fmt;

/// A barcode encoding standard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BarcodeFormat {
    QrCode,
    Ean13,
    Ean8,
    UpcA,
    UpcE,
    Code128,
    Code39,
    DataMatrix,
    Pdf417,
    Aztec,
    Itf,
    Code93,
    Codabar,
    MicroQrCode,
    MaxiCode,
    /// GS1 DataBar, readable by some decoders but not ranked
    DataBar,
    /// GS1 DataBar Expanded, readable by some decoders but not ranked
    DataBarExpanded,
    /// Format reported by a decoder that this crate does not know
    #[default]
    Unknown,
}

impl BarcodeFormat {
    /// Every supported format, most popular first
    ///
    /// This is also the set requested from decoders on every call.
    pub const ALL: [BarcodeFormat; 15] = [
        BarcodeFormat::QrCode,
        BarcodeFormat::Ean13,
        BarcodeFormat::Ean8,
        BarcodeFormat::UpcA,
        BarcodeFormat::UpcE,
        BarcodeFormat::Code128,
        BarcodeFormat::Code39,
        BarcodeFormat::DataMatrix,
        BarcodeFormat::Pdf417,
        BarcodeFormat::Aztec,
        BarcodeFormat::Itf,
        BarcodeFormat::Code93,
        BarcodeFormat::Codabar,
        BarcodeFormat::MicroQrCode,
        BarcodeFormat::MaxiCode,
    ];

    /// Canonical identifier, as printed by ZXing-family decoders
    pub fn name(&self) -> &'static str {
        match self {
            Self::QrCode => "QRCode",
            Self::Ean13 => "EAN-13",
            Self::Ean8 => "EAN-8",
            Self::UpcA => "UPC-A",
            Self::UpcE => "UPC-E",
            Self::Code128 => "Code128",
            Self::Code39 => "Code39",
            Self::DataMatrix => "DataMatrix",
            Self::Pdf417 => "PDF417",
            Self::Aztec => "Aztec",
            Self::Itf => "ITF",
            Self::Code93 => "Code93",
            Self::Codabar => "Codabar",
            Self::MicroQrCode => "MicroQRCode",
            Self::MaxiCode => "MaxiCode",
            Self::DataBar => "DataBar",
            Self::DataBarExpanded => "DataBarExpanded",
            Self::Unknown => "Unknown",
        }
    }

    /// Human-readable name for format pickers and history output
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::QrCode => "QR Code",
            Self::Ean13 => "EAN-13",
            Self::Ean8 => "EAN-8",
            Self::UpcA => "UPC-A",
            Self::UpcE => "UPC-E",
            Self::Code128 => "Code 128",
            Self::Code39 => "Code 39",
            Self::DataMatrix => "Data Matrix",
            Self::Pdf417 => "PDF417",
            Self::Aztec => "Aztec",
            Self::Itf => "ITF",
            Self::Code93 => "Code 93",
            Self::Codabar => "Codabar",
            Self::MicroQrCode => "Micro QR Code",
            Self::MaxiCode => "MaxiCode",
            Self::DataBar => "DataBar",
            Self::DataBarExpanded => "DataBar Expanded",
            Self::Unknown => "Unknown",
        }
    }

    /// Where the format is typically found
    pub fn usage(&self) -> &'static str {
        match self {
            Self::QrCode => "general purpose, most common",
            Self::Ean13 => "retail products",
            Self::Ean8 => "small retail packages",
            Self::UpcA => "North American retail",
            Self::UpcE => "compact retail",
            Self::Code128 => "logistics and shipping",
            Self::Code39 => "industrial labels",
            Self::DataMatrix => "high-density part marking",
            Self::Pdf417 => "identity documents",
            Self::Aztec => "transport tickets",
            Self::Itf => "numeric, shipping cartons",
            Self::Code93 => "extended Code 39",
            Self::Codabar => "libraries and healthcare",
            Self::MicroQrCode => "small-footprint QR",
            Self::MaxiCode => "postal parcels",
            Self::DataBar | Self::DataBarExpanded => "fresh produce, coupons",
            Self::Unknown => "",
        }
    }

    /// Parse a decoder-provided format name
    ///
    /// Case, spaces, dashes and underscores are ignored, so "QR Code",
    /// "QRCode" and "qr_code" all resolve to [`BarcodeFormat::QrCode`].
    pub fn from_name(name: &str) -> Option<Self> {
        let key: String = name
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .flat_map(char::to_lowercase)
            .collect();

        let format = match key.as_str() {
            "qrcode" | "qr" => Self::QrCode,
            "ean13" => Self::Ean13,
            "ean8" => Self::Ean8,
            "upca" => Self::UpcA,
            "upce" => Self::UpcE,
            "code128" => Self::Code128,
            "code39" => Self::Code39,
            "datamatrix" => Self::DataMatrix,
            "pdf417" => Self::Pdf417,
            "aztec" => Self::Aztec,
            "itf" => Self::Itf,
            "code93" => Self::Code93,
            "codabar" => Self::Codabar,
            "microqrcode" | "microqr" => Self::MicroQrCode,
            "maxicode" => Self::MaxiCode,
            "databar" => Self::DataBar,
            "databarexpanded" => Self::DataBarExpanded,
            _ => return None,
        };
        Some(format)
    }
}

impl fmt::Display for BarcodeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
