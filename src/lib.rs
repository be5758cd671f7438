// THEORY:
// This file is the main entry point for the `fill_level` library crate. It exposes
// the request boundary (`pipeline`) and the worker pool that runs requests off the
// caller's task (`parallel_pipeline`). The scanner and the filler themselves live in
// `core_modules` and are usable directly by hosts that bring their own transport.
//
// Typical use: scan an image once when it loads, keep the descriptors, then raise
// the fill level frame by frame, feeding each call the cursor the previous one
// returned.

pub mod core_modules;
pub mod parallel_pipeline;
pub mod pipeline;
