pub mod error;
pub mod incremental_filler;
pub mod pixel;
pub mod pixel_buffer;
pub mod position_scanner;
