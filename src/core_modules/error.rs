// Error type shared by the scanner, the filler and the worker pool.
// Every variant is detected at call entry and carries the values that broke the rule.
use std::fmt::{self, Display};

#[derive(Debug)]
pub enum Error {
    /// Width is zero or does not divide the buffer into whole rows.
    InvalidDimension { width: u32, len: usize },
    /// Resume cursor lies past the end of the descriptor list.
    InvalidCursor { cursor: usize, len: usize },
    /// Buffer length is not a whole number of RGBA records.
    MalformedBuffer { len: usize },
    /// A descriptor points at a pixel outside the buffer it is applied to.
    DescriptorOutOfBounds { index: usize, byte_offset: usize, len: usize },
    /// The worker pool stopped accepting or answering requests.
    WorkerUnavailable,
    /// A worker panicked while running the request; the worker itself keeps serving.
    RequestPanicked { op: &'static str },
    /// Decoding or encoding an image file failed.
    Image(image::ImageError),
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidDimension { width, len } => {
                write!(f, "invalid dimension: width {width} does not divide a {len}-byte buffer into rows")
            }
            Error::InvalidCursor { cursor, len } => {
                write!(f, "invalid cursor: {cursor} is outside 0..={len}")
            }
            Error::MalformedBuffer { len } => {
                write!(f, "malformed buffer: {len} bytes is not a multiple of 4")
            }
            Error::DescriptorOutOfBounds { index, byte_offset, len } => write!(
                f,
                "descriptor {index} points at byte {byte_offset}, outside a {len}-byte buffer"
            ),
            Error::WorkerUnavailable => write!(f, "worker pool is not accepting requests"),
            Error::RequestPanicked { op } => write!(f, "{op} request panicked on its worker"),
            Error::Image(e) => write!(f, "image error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Image(e) => Some(e),
            _ => None,
        }
    }
}

impl From<image::ImageError> for Error {
    fn from(e: image::ImageError) -> Self {
        Error::Image(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
