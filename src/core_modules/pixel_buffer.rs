// THEORY:
// `PixelBuffer` is the validated form of the raw RGBA byte stream the engine works
// on. The raw bytes stay flat and row-major exactly as a canvas or decoder hands
// them over; the wrapper only adds the width and the guarantee that the bytes
// divide into whole rows of whole pixels. With that guarantee in place the scanner
// never has to re-check geometry while it walks the buffer.
//
// It is also the bridge to the `image` crate: icons are decoded into a buffer and
// animation frames are encoded back out as PNG.

use crate::core_modules::error::{Error, Result};
use crate::core_modules::pixel::pixel::CHANNELS;
use image::{ImageEncoder, RgbaImage};
use std::path::Path;

/// A row-major RGBA8 buffer whose length is a whole number of rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    data: Vec<u8>,
    width: u32,
}

impl PixelBuffer {
    /// Wraps raw bytes, rejecting a width or length that cannot describe an RGBA image.
    pub fn new(data: Vec<u8>, width: u32) -> Result<Self> {
        Self::validate(&data, width)?;
        Ok(Self { data, width })
    }

    /// Checks the buffer invariants without taking ownership.
    ///
    /// A length that is not a multiple of 4 is a `MalformedBuffer`; a zero width or
    /// one that does not divide the buffer into rows is an `InvalidDimension`.
    pub fn validate(data: &[u8], width: u32) -> Result<()> {
        if data.len() % CHANNELS != 0 {
            return Err(Error::MalformedBuffer { len: data.len() });
        }
        let row_bytes = width as usize * CHANNELS;
        if row_bytes == 0 || data.len() % row_bytes != 0 {
            return Err(Error::InvalidDimension {
                width,
                len: data.len(),
            });
        }
        Ok(())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        (self.data.len() / (self.width as usize * CHANNELS)) as u32
    }

    /// Number of pixel records in the buffer.
    pub fn pixel_count(&self) -> usize {
        self.data.len() / CHANNELS
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Decodes any format the `image` crate understands into RGBA8.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let image = image::open(path)?.to_rgba8();
        Ok(Self::from(image))
    }

    /// Encodes the buffer as an RGBA PNG.
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let output = std::fs::File::create(path).map_err(image::ImageError::IoError)?;
        let encoder = image::codecs::png::PngEncoder::new(output);

        encoder.write_image(
            &self.data,
            self.width,
            self.height(),
            image::ExtendedColorType::Rgba8,
        )?;

        Ok(())
    }

    /// Converts back into an `image` buffer for callers that render with it.
    pub fn into_rgba_image(self) -> Result<RgbaImage> {
        let (width, height, len) = (self.width, self.height(), self.data.len());
        RgbaImage::from_raw(width, height, self.data).ok_or(Error::InvalidDimension { width, len })
    }
}

/// Row of the pixel whose red channel sits at `byte_offset` in a buffer `width`
/// pixels wide. `width` must be non-zero, which `PixelBuffer::validate` guarantees.
pub fn row_of(byte_offset: usize, width: u32) -> u32 {
    (byte_offset / CHANNELS / width as usize) as u32
}

impl From<RgbaImage> for PixelBuffer {
    fn from(image: RgbaImage) -> Self {
        let width = image.width();
        Self {
            data: image.into_raw(),
            width,
        }
    }
}
