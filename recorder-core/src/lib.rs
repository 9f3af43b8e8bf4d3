//! # recorder-core
//!
//! Platform-agnostic audio-queue recorder.
//!
//! Negotiates a capture format with the default input device, sizes and
//! cycles a small pool of capture buffers, and streams every filled buffer's
//! packets into an audio file at a monotonically advancing packet index.
//! Platform backends (Core Audio, cpal) implement the `CaptureBackend` trait
//! and plug into the generic `Recorder`.
//!
//! ## Architecture
//!
//! ```text
//! recorder-core (this crate)
//! ├── traits/       ← CaptureBackend, CaptureQueue, InputHandler, AudioFileService, RecorderDelegate
//! ├── models/       ← RecorderError, EngineState, RecorderConfiguration, StreamFormat, RecordingResult
//! ├── processing/   ← format negotiation, buffer sizing, CAF chunk encoding
//! ├── session/      ← Recorder (orchestrator), RecorderState (packet writer), cookie propagation
//! └── storage/      ← CafFileWriter, checksum, metadata sidecar
//! ```

pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

// Re-export key types at crate root for convenience.
pub use models::config::RecorderConfiguration;
pub use models::error::RecorderError;
pub use models::format::{FormatId, PacketDescription, StreamFormat};
pub use models::recording_result::{RecorderDiagnostics, RecordingMetadata, RecordingResult};
pub use models::state::EngineState;
pub use processing::buffer_size::compute_buffer_size;
pub use processing::format_negotiator::negotiate;
pub use session::recorder::Recorder;
pub use storage::caf_writer::{CafFileService, CafFileWriter};
pub use traits::audio_file::{AudioFile, AudioFileService, FileFlags};
pub use traits::capture_queue::{
    BufferDisposition, BufferId, CaptureBackend, CaptureQueue, FilledBuffer, InputHandler, SharedInputHandler,
};
pub use traits::device::{DeviceId, DeviceQuery, FormatResolver};
pub use traits::recorder_delegate::RecorderDelegate;
