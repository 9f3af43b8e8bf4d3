use std::sync::Arc;

use parking_lot::Mutex;

use super::device::{DeviceQuery, FormatResolver};
use crate::models::error::RecorderError;
use crate::models::format::{PacketDescription, StreamFormat};

/// Handle of one buffer in a capture queue's pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub usize);

/// A buffer the capture subsystem has just filled.
#[derive(Debug, Clone, Copy)]
pub struct FilledBuffer<'a> {
    pub buffer: BufferId,
    pub data: &'a [u8],
    pub packet_count: u32,
    /// Empty for constant-bitrate formats.
    pub packet_descriptions: &'a [PacketDescription],
}

/// What the queue should do with a buffer once its handler returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferDisposition {
    /// Enqueue the buffer again for more capture.
    Resubmit,
    /// Keep the buffer out of circulation until the queue is disposed.
    Release,
}

/// Receives every filled buffer of one capture queue.
pub trait InputHandler: Send {
    fn on_buffer_filled(&mut self, filled: FilledBuffer<'_>) -> BufferDisposition;
}

/// Handler shared between the orchestrator and the queue's capture thread.
///
/// Queues must lock it for the whole of each invocation, which serializes
/// callbacks explicitly.
pub type SharedInputHandler = Arc<Mutex<dyn InputHandler>>;

/// An asynchronous input queue bound to one format and one handler.
///
/// Dropping the queue disposes it and releases every buffer it allocated.
pub trait CaptureQueue: Send + Sync {
    /// The format the queue's encoder actually produces. May carry fields the
    /// creation request left unknown.
    fn current_format(&self) -> Result<StreamFormat, RecorderError>;

    /// Largest packet the encoder can emit, in bytes.
    fn max_output_packet_size(&self) -> Result<u32, RecorderError>;

    /// Size of the encoder's magic cookie; 0 when it has none.
    fn magic_cookie_size(&self) -> Result<usize, RecorderError>;

    /// Copy the magic cookie into `cookie`, returning the bytes copied.
    fn copy_magic_cookie(&self, cookie: &mut [u8]) -> Result<usize, RecorderError>;

    fn allocate_buffer(&self, byte_capacity: u32) -> Result<BufferId, RecorderError>;

    fn enqueue_buffer(&self, buffer: BufferId) -> Result<(), RecorderError>;

    /// Begin capture. Returns immediately; buffers arrive on the handler.
    fn start(&self) -> Result<(), RecorderError>;

    /// Stop capture. With `immediate`, returns only once no handler call is in
    /// progress and none will follow.
    fn stop(&self, immediate: bool) -> Result<(), RecorderError>;
}

/// A platform that can negotiate formats and create capture queues.
pub trait CaptureBackend: DeviceQuery + FormatResolver {
    type Queue: CaptureQueue + 'static;

    /// Create an input queue recording `format`, delivering to `handler`.
    fn new_input(
        &self,
        format: &StreamFormat,
        handler: SharedInputHandler,
    ) -> Result<Self::Queue, RecorderError>;
}
