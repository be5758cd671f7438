// THEORY:
// The position scanner turns a transparent-background image into the ordered work
// list the filler consumes. It runs once per image load; everything after that is
// incremental.
//
// Two passes over the buffer:
// 1.  **Top-down**: find the first opaque record. Its row is the top of the shape
//     (`min_opaque_row`).
// 2.  **Bottom-up**: walk records from the end of the buffer. The first opaque
//     record fixes the bottom of the shape; every opaque record becomes a
//     `PixelDescriptor` in the order it is met.
//
// Both passes test the same byte, the alpha channel at `offset + 3`. The list is
// never sorted. Its order (bottom row first, right to left within a row) is what
// lets the filler stop at the first pixel above the current level and resume there
// on the next call.

use crate::core_modules::error::Result;
use crate::core_modules::pixel::pixel::{ALPHA_OFFSET, CHANNELS};
use crate::core_modules::pixel_buffer::{self, PixelBuffer};
use log::debug;
use serde::{Deserialize, Serialize};

/// Fractions are quantized to hundredths.
const FRACTION_STEPS: u64 = 100;

/// One opaque pixel and how far up the shape it sits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelDescriptor {
    /// Quantized position between the bottom row (smallest) and the top row (1.0).
    pub fill_fraction: f64,
    /// Index of the pixel's red channel in the buffer.
    pub byte_offset: usize,
}

/// The cached output of one scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    /// Opaque pixels in bottom-up scan order.
    pub descriptors: Vec<PixelDescriptor>,
    /// Row of the topmost opaque pixel, 0 for a fully transparent image.
    pub min_opaque_row: u32,
}

impl ScanResult {
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

/// Validates a raw buffer and scans it.
pub fn scan_raw(pixels: &[u8], width: u32) -> Result<ScanResult> {
    PixelBuffer::validate(pixels, width)?;
    Ok(scan_records(pixels, width))
}

/// Scans an already validated buffer.
pub fn scan(pixels: &PixelBuffer) -> ScanResult {
    scan_records(pixels.as_bytes(), pixels.width())
}

fn scan_records(pixels: &[u8], width: u32) -> ScanResult {
    let row_of = |offset: usize| u64::from(pixel_buffer::row_of(offset, width));
    let is_opaque = |offset: &usize| pixels[offset + ALPHA_OFFSET] != 0;

    let min_opaque_row = match (0..pixels.len()).step_by(CHANNELS).find(is_opaque) {
        Some(offset) => row_of(offset),
        None => {
            debug!("scan: no opaque pixels in {} bytes", pixels.len());
            return ScanResult::default();
        }
    };

    let mut descriptors = Vec::new();
    let mut max_opaque_row = None;

    for offset in (0..pixels.len()).step_by(CHANNELS).rev().filter(is_opaque) {
        let row = row_of(offset);
        let ymax = *max_opaque_row.get_or_insert(row);
        descriptors.push(PixelDescriptor {
            fill_fraction: fill_fraction(row, min_opaque_row, ymax),
            byte_offset: offset,
        });
    }

    debug!(
        "scan: {} opaque pixels between rows {} and {}",
        descriptors.len(),
        min_opaque_row,
        max_opaque_row.unwrap_or(min_opaque_row)
    );

    ScanResult {
        descriptors,
        min_opaque_row: min_opaque_row as u32,
    }
}

/// `ceil((ymax - y + 1) * 100 / (ymax - ymin + 1)) / 100`, in integer percent so the
/// rounding is exact. Callers guarantee `ymin <= y <= ymax`.
fn fill_fraction(row: u64, ymin: u64, ymax: u64) -> f64 {
    let span = ymax - ymin + 1;
    let percent = ((ymax - row + 1) * FRACTION_STEPS).div_ceil(span);
    percent as f64 / FRACTION_STEPS as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::error::Error;

    /// Builds a `width` x `height` buffer where `opaque(x, y)` picks the opaque pixels.
    fn shape(width: u32, height: u32, opaque: impl Fn(u32, u32) -> bool) -> PixelBuffer {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                let alpha = if opaque(x, y) { 255 } else { 0 };
                data.extend_from_slice(&[255, 255, 255, alpha]);
            }
        }
        PixelBuffer::new(data, width).expect("valid test buffer")
    }

    fn fractions(result: &ScanResult) -> Vec<f64> {
        result.descriptors.iter().map(|d| d.fill_fraction).collect()
    }

    #[test]
    fn opaque_two_by_two_scans_bottom_row_first() {
        let buffer = shape(2, 2, |_, _| true);
        let result = scan(&buffer);

        assert_eq!(result.min_opaque_row, 0);
        assert_eq!(fractions(&result), vec![0.5, 0.5, 1.0, 1.0]);
        let offsets: Vec<usize> = result.descriptors.iter().map(|d| d.byte_offset).collect();
        assert_eq!(offsets, vec![12, 8, 4, 0]);
    }

    #[test]
    fn transparent_image_yields_nothing() {
        let buffer = shape(3, 3, |_, _| false);
        let result = scan(&buffer);
        assert!(result.is_empty());
        assert_eq!(result.min_opaque_row, 0);
    }

    #[test]
    fn single_row_shape_is_full_fraction() {
        let buffer = shape(4, 5, |x, y| y == 2 && x > 0);
        let result = scan(&buffer);
        assert_eq!(result.min_opaque_row, 2);
        assert_eq!(fractions(&result), vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn fractions_rise_as_rows_climb() {
        // A triangle with transparent margin above and below.
        let buffer = shape(7, 9, |x, y| (2..8).contains(&y) && x <= y);
        let result = scan(&buffer);
        assert_eq!(result.min_opaque_row, 2);

        let rows: Vec<u32> = result
            .descriptors
            .iter()
            .map(|d| pixel_buffer::row_of(d.byte_offset, buffer.width()))
            .collect();
        for (pair, rows) in result.descriptors.windows(2).zip(rows.windows(2)) {
            assert!(rows[0] >= rows[1], "scan order must never go back down");
            if rows[0] > rows[1] {
                assert!(pair[0].fill_fraction <= pair[1].fill_fraction);
            }
        }
    }

    #[test]
    fn fractions_stay_within_bounds() {
        let buffer = shape(5, 13, |x, y| (x + y) % 3 != 0 && y > 1);
        let result = scan(&buffer);
        assert!(!result.is_empty());
        for descriptor in &result.descriptors {
            assert!(descriptor.fill_fraction > 0.0 && descriptor.fill_fraction <= 1.0);
        }
        let top = result
            .descriptors
            .iter()
            .filter(|d| pixel_buffer::row_of(d.byte_offset, buffer.width()) == result.min_opaque_row);
        for descriptor in top {
            assert_eq!(descriptor.fill_fraction, 1.0);
        }
    }

    #[test]
    fn fractions_round_up_to_hundredths() {
        // Three opaque rows: 1/3 and 2/3 round up to 0.34 and 0.67.
        let buffer = shape(1, 3, |_, _| true);
        assert_eq!(fractions(&scan(&buffer)), vec![0.34, 0.67, 1.0]);
    }

    #[test]
    fn only_alpha_marks_a_pixel_opaque() {
        // Colour without alpha is transparent; alpha without colour is opaque.
        let data = vec![255, 255, 255, 0, 0, 0, 0, 7];
        let result = scan_raw(&data, 2).expect("valid buffer");
        assert_eq!(result.descriptors.len(), 1);
        assert_eq!(result.descriptors[0].byte_offset, 4);
    }

    #[test]
    fn scan_raw_rejects_bad_geometry() {
        assert!(matches!(scan_raw(&[0u8; 10], 1), Err(Error::MalformedBuffer { len: 10 })));
        assert!(matches!(scan_raw(&[0u8; 16], 0), Err(Error::InvalidDimension { .. })));
        assert!(matches!(scan_raw(&[0u8; 16], 3), Err(Error::InvalidDimension { .. })));
    }
}
