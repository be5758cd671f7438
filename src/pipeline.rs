// THEORY:
// The `pipeline` module is the request boundary of the fill engine. A host (a UI
// thread, a web worker bridge, the worker pool in `parallel_pipeline`) sends one
// `Request` and receives one `Response`; `handle` maps each request onto exactly
// one core invocation and keeps nothing between calls.
//
// `FillPipeline` is the synchronous reference driver built on top of it. It owns
// the state a host would otherwise have to carry between frames (the buffer, the
// cached scan and the cursor) for one animation.

use crate::core_modules::error::Result;
use crate::core_modules::incremental_filler::{self, FillState};
use crate::core_modules::pixel_buffer::PixelBuffer;
use crate::core_modules::position_scanner;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// Re-export key data structures for the public API.
pub use crate::core_modules::error::Error;
pub use crate::core_modules::incremental_filler::FillOutcome;
pub use crate::core_modules::position_scanner::{PixelDescriptor, ScanResult};

/// Environment variable that overrides the worker count.
pub const WORKERS_ENV: &str = "FILL_LEVEL_WORKERS";

/// Configuration for the worker pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Number of worker tasks requests are spread across.
    pub worker_count: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            worker_count: num_cpus::get().max(1),
        }
    }
}

impl PipelineConfig {
    /// Defaults, with the worker count taken from `FILL_LEVEL_WORKERS` when it holds
    /// a positive integer.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        match std::env::var(WORKERS_ENV).map(|v| v.trim().parse::<usize>()) {
            Ok(Ok(count)) if count > 0 => config.worker_count = count,
            Ok(_) => warn!("ignoring {WORKERS_ENV}: expected a positive integer"),
            Err(_) => {}
        }
        config
    }
}

/// One unit of work for the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Request {
    Scan {
        pixels: Vec<u8>,
        width: u32,
    },
    Fill {
        pixels: Vec<u8>,
        descriptors: Arc<[PixelDescriptor]>,
        cursor: usize,
        threshold: f64,
    },
}

/// The answer to exactly one `Request`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Scanned(ScanResult),
    Filled(FillOutcome),
}

impl Request {
    pub fn op(&self) -> &'static str {
        match self {
            Request::Scan { .. } => "scan",
            Request::Fill { .. } => "fill",
        }
    }
}

/// Runs one request to completion.
pub fn handle(request: Request) -> Result<Response> {
    let op = request.op();
    let result = match request {
        Request::Scan { pixels, width } => {
            position_scanner::scan_raw(&pixels, width).map(Response::Scanned)
        }
        Request::Fill {
            pixels,
            descriptors,
            cursor,
            threshold,
        } => incremental_filler::fill(pixels, &descriptors, threshold, cursor).map(Response::Filled),
    };
    if let Err(e) = &result {
        warn!("{op} request rejected: {e}");
    }
    result
}

/// Drives the fill animation of one image on the calling thread.
pub struct FillPipeline {
    pristine: PixelBuffer,
    pixels: PixelBuffer,
    scan: ScanResult,
    state: FillState,
}

impl FillPipeline {
    /// Scans the image once; every later level change reuses that scan.
    pub fn new(pixels: PixelBuffer) -> Self {
        let scan = position_scanner::scan(&pixels);
        debug!(
            "pipeline: {}x{} image, {} fillable pixels",
            pixels.width(),
            pixels.height(),
            scan.descriptors.len()
        );
        Self {
            pristine: pixels.clone(),
            pixels,
            scan,
            state: FillState::default(),
        }
    }

    /// Raises the fill level to `threshold` and returns the new cursor.
    ///
    /// Colour cannot be taken back out, so a lower level than before leaves the
    /// image as it is. Use `reset` to start over.
    pub fn set_level(&mut self, threshold: f64) -> Result<usize> {
        self.state
            .advance(self.pixels.as_bytes_mut(), &self.scan.descriptors, threshold)
    }

    /// Restores the original image and rewinds the cursor.
    pub fn reset(&mut self) {
        self.pixels = self.pristine.clone();
        self.state = FillState::default();
    }

    pub fn pixels(&self) -> &PixelBuffer {
        &self.pixels
    }

    pub fn scan_result(&self) -> &ScanResult {
        &self.scan
    }

    pub fn state(&self) -> FillState {
        self.state
    }

    /// True once every fillable pixel has been coloured.
    pub fn is_full(&self) -> bool {
        self.state.cursor == self.scan.descriptors.len()
    }
}
