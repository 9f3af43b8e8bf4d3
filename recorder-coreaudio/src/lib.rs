//! # recorder-coreaudio
//!
//! macOS AudioQueue backend for the audio-queue recorder.
//!
//! Provides:
//! - `CoreAudioBackend`: default input device queries, format completion via
//!   the AudioFormat API, and input queue creation
//! - `CoreAudioQueue`: an `AudioQueueNewInput` queue whose encoder delivers
//!   packets to the recorder's handler
//! - `status`: `OSStatus` rendering shared by every call site
//!
//! ## Usage
//! ```ignore
//! use recorder_coreaudio::CoreAudioBackend;
//! use recorder_core::{CafFileService, Recorder, RecorderConfiguration};
//!
//! let mut recorder = Recorder::new(CoreAudioBackend::new(), CafFileService, RecorderConfiguration::default());
//! recorder.start()?;
//! ```

pub mod status;

#[cfg(target_os = "macos")]
mod asbd;
#[cfg(target_os = "macos")]
pub mod audio_queue;
#[cfg(target_os = "macos")]
pub mod device;

#[cfg(target_os = "macos")]
pub use audio_queue::CoreAudioQueue;
#[cfg(target_os = "macos")]
pub use device::CoreAudioBackend;
