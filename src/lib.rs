// THEORY:
// This file is the entry point for the `carlink` library crate. It exposes the two
// demodulation engines that authenticate a vehicle and its user:
//
// 1.  **VLC (Visible-Light Communication)**: a frame-by-frame state machine that finds
//     a fixed number of blinking transmitters in a camera stream, locks onto them as
//     regions of interest and turns their brightness into bits, gated by a clock
//     transmitter.
// 2.  **VBC (Vibration-Based Communication)**: a sample-by-sample state machine that
//     calibrates pulse timing and amplitude from a sync preamble and then slices
//     envelope amplitude into bits.
//
// The engines in `core_modules` are plain synchronous values with no I/O. Everything
// that blocks or waits (replaying frames and sample logs, owning a decoder on its own
// task, assembling bits into values) lives in `source`, `link` and `assembler`, and
// talks to the engines through single-producer/single-consumer channels.

pub mod assembler;
pub mod config;
pub mod core_modules;
pub mod error;
pub mod link;
pub mod source;

pub use assembler::BitAssembler;
pub use config::CarlinkConfig;
pub use core_modules::blob::Blob;
pub use core_modules::blob_detector::blob_detector::find_blobs;
pub use core_modules::roi_block::RoiBlock;
pub use core_modules::vbc_decoder::{VbcDecision, VbcDecoder, VbcState};
pub use core_modules::vlc_decoder::{DecoderType, VlcDecoder, VlcOutput, VlcState};
pub use error::{DecodeError, Result};
pub use link::LinkEvent;
