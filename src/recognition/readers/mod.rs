// SPDX-License-Identifier: GPL-3.0-only

//! Barcode reader backends
//!
//! Implementations of [`crate::recognition::BarcodeReader`] over concrete
//! decoding libraries.

pub mod qr;

pub use qr::RqrrReader;
