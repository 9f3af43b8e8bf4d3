//! # recorder-cpal
//!
//! Portable capture backend for the audio-queue recorder, built on cpal.
//!
//! Provides:
//! - `CpalBackend`: default input device queries and linear-PCM format completion
//! - `CpalInputQueue`: a buffer-pool input queue fed from a cpal input stream
//! - `sample_convert`: device samples to packed 16-bit little-endian frames
//!
//! There is no encoder here: only linear PCM can be recorded.

pub mod device;
pub mod input_queue;
pub mod pool;
pub mod sample_convert;

pub use device::CpalBackend;
pub use input_queue::CpalInputQueue;
