// THEORY:
// The incremental filler recolours the pixels the fill level has reached since the
// last call. It is driven once per animation frame with a threshold that only ever
// rises, so it never rescans: the cursor returned by one call is where the next one
// starts, and every pixel is touched at most once over the whole animation.
//
// A call is split into two steps so a rejected request leaves the buffer as it was:
// first find how far the level reaches and check those descriptors against the
// buffer, then recolour that span.

use crate::core_modules::error::{Error, Result};
use crate::core_modules::pixel::pixel::{CHANNELS, Pixel};
use crate::core_modules::position_scanner::PixelDescriptor;
use log::debug;
use serde::{Deserialize, Serialize};

/// Resume point and level of an animation between fill calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FillState {
    pub cursor: usize,
    /// Highest level applied so far.
    pub threshold: f64,
}

/// What a fill call hands back: where to resume and the buffer it recoloured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillOutcome {
    pub new_cursor: usize,
    pub pixels: Vec<u8>,
}

/// Takes ownership of the buffer, recolours it and hands it back.
pub fn fill(
    mut pixels: Vec<u8>,
    descriptors: &[PixelDescriptor],
    threshold: f64,
    cursor: usize,
) -> Result<FillOutcome> {
    let new_cursor = fill_in_place(&mut pixels, descriptors, threshold, cursor)?;
    Ok(FillOutcome { new_cursor, pixels })
}

/// Recolours, in place, every descriptor from `cursor` on whose fraction is at or
/// below `threshold`, stopping at the first one above it.
///
/// Returns the index of that first descriptor, or `descriptors.len()` once the whole
/// list is coloured.
pub fn fill_in_place(
    pixels: &mut [u8],
    descriptors: &[PixelDescriptor],
    threshold: f64,
    cursor: usize,
) -> Result<usize> {
    if pixels.len() % CHANNELS != 0 {
        return Err(Error::MalformedBuffer { len: pixels.len() });
    }
    if cursor > descriptors.len() {
        return Err(Error::InvalidCursor {
            cursor,
            len: descriptors.len(),
        });
    }

    // Negated so a NaN level matches nothing.
    let reached = descriptors[cursor..]
        .iter()
        .position(|d| !(d.fill_fraction <= threshold))
        .map_or(descriptors.len(), |n| cursor + n);

    let span = &descriptors[cursor..reached];
    for (n, descriptor) in span.iter().enumerate() {
        let end = descriptor.byte_offset.checked_add(CHANNELS);
        if end.is_none_or(|end| end > pixels.len()) {
            return Err(Error::DescriptorOutOfBounds {
                index: cursor + n,
                byte_offset: descriptor.byte_offset,
                len: pixels.len(),
            });
        }
    }

    for descriptor in span {
        let record = &mut pixels[descriptor.byte_offset..descriptor.byte_offset + CHANNELS];
        Pixel::from(&*record).filled().write_to(record);
    }

    if !span.is_empty() {
        debug!(
            "fill: coloured {} pixels up to level {threshold}, cursor {cursor} -> {reached}",
            span.len()
        );
    }

    Ok(reached)
}

impl FillState {
    /// Applies one fill call and advances the state to its result.
    pub fn advance(
        &mut self,
        pixels: &mut [u8],
        descriptors: &[PixelDescriptor],
        threshold: f64,
    ) -> Result<usize> {
        self.cursor = fill_in_place(pixels, descriptors, threshold, self.cursor)?;
        self.threshold = self.threshold.max(threshold);
        Ok(self.cursor)
    }
}
